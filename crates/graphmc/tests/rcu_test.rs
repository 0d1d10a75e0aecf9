//! Integration Test: RCU grace periods
//!
//! Under the Linux-kernel model, a read-side critical section either ends
//! before a concurrent `synchronize_rcu` or starts after it.

mod common;

use common::{load, observe, store};
use graphmc::{ExplorerConfig, MemoryModel, StopPolicy};
use serde_json::{json, Value as Json};

fn lkmm() -> ExplorerConfig {
    ExplorerConfig::builder()
        .with_model(MemoryModel::Lkmm)
        .with_stop_policy(StopPolicy::Exhaustive)
        .build()
}

fn two_threads(t0: Vec<Json>, t1: Vec<Json>) -> Json {
    json!({
        "globals": [{"name": "x"}, {"name": "y"}],
        "functions": [{"name": "t0", "body": t0}, {"name": "t1", "body": t1}],
        "threads": [{"function": "t0"}, {"function": "t1"}]
    })
}

/// Reader observes the update
///
/// # Scenario
///
/// T0: rcu_read_lock; a = y; b = x; rcu_read_unlock
/// T1: x = 1; synchronize_rcu; y = 1
///
/// # Expected
///
/// Seeing y = 1 puts the section after the grace period, so it must also
/// see x = 1: (1, 0) never shows up, 3 executions.
#[test]
fn test_reader_after_grace_period_sees_update() {
    let program = two_threads(
        vec![
            json!({"op": "rcu_read_lock"}),
            load(1, "y", "relaxed"),
            load(2, "x", "relaxed"),
            json!({"op": "rcu_read_unlock"}),
        ],
        vec![store("x", 1, "relaxed"), json!({"op": "synchronize_rcu"}), store("y", 1, "relaxed")],
    );
    let (outcome, seen) = observe(program, lkmm());
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.stats.executions, 3);
    assert!(!seen.reads.contains(&vec![vec![1, 0], vec![]]));
}

/// Updater observes the section
///
/// # Scenario
///
/// T0: rcu_read_lock; x = 1; y = 1; rcu_read_unlock
/// T1: a = y; synchronize_rcu; b = x
///
/// # Expected
///
/// Seeing y = 1 before the grace period means the section ended before
/// it, so x = 1 is visible after it: (1, 0) never shows up, 3 executions.
#[test]
fn test_section_seen_before_grace_period_is_visible_after() {
    let program = two_threads(
        vec![
            json!({"op": "rcu_read_lock"}),
            store("x", 1, "relaxed"),
            store("y", 1, "relaxed"),
            json!({"op": "rcu_read_unlock"}),
        ],
        vec![load(1, "y", "relaxed"), json!({"op": "synchronize_rcu"}), load(2, "x", "relaxed")],
    );
    let (outcome, seen) = observe(program.clone(), lkmm());
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.stats.executions, 3);
    assert!(!seen.reads.contains(&vec![vec![], vec![1, 0]]));

    let config = ExplorerConfig::builder()
        .with_model(MemoryModel::Ra)
        .with_stop_policy(StopPolicy::Exhaustive)
        .build();
    let (outcome, seen) = observe(program, config);
    assert_eq!(outcome.report.stats.executions, 4);
    assert!(seen.reads.contains(&vec![vec![], vec![1, 0]]));
}
