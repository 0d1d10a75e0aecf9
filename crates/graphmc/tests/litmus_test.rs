//! Integration Test: classic litmus shapes
//!
//! Each test counts the executions explored under a memory model and checks
//! which outcomes show up. Every consistent graph is visited exactly once,
//! so the counts are exact.

mod common;

use common::{load, observe, program, store};
use graphmc::domain::Oracle;
use graphmc::{Checker, ExecutionGraph, ExecutionObserver, ExplorerConfig, MemoryModel, StopPolicy};
use serde_json::{json, Value as Json};

fn config(model: MemoryModel) -> ExplorerConfig {
    ExplorerConfig::builder()
        .with_model(model)
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

fn store_buffering(fence: bool) -> Json {
    let side = |mine: &str, other: &str| {
        let mut body = vec![store(mine, 1, "relaxed")];
        if fence {
            body.push(json!({"op": "fence", "order": "seq_cst"}));
        }
        body.push(load(1, other, "relaxed"));
        body
    };
    two_threads(side("x", "y"), side("y", "x"))
}

/// Store buffering
///
/// # Scenario
///
/// T0: x = 1; r = y    T1: y = 1; r = x
///
/// # Expected
///
/// SC forbids both threads reading 0, leaving 3 executions.
#[test]
fn test_store_buffering_sc() {
    let (outcome, seen) = observe(store_buffering(false), config(MemoryModel::Sc));
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.stats.executions, 3);
    assert!(!seen.reads.contains(&vec![vec![0], vec![0]]));
}

/// Store buffering under the weaker models
///
/// # Expected
///
/// TSO and RA both let the stores sit in a buffer, so all 4 outcomes appear.
#[test]
fn test_store_buffering_weak() {
    for model in [MemoryModel::Tso, MemoryModel::Ra] {
        let (outcome, seen) = observe(store_buffering(false), config(model));
        assert_eq!(outcome.report.stats.executions, 4, "{model:?}");
        assert!(seen.reads.contains(&vec![vec![0], vec![0]]), "{model:?}");
    }
}

/// Store buffering with full fences under TSO
///
/// # Expected
///
/// The fences restore store→load order: back to 3 executions.
#[test]
fn test_store_buffering_fenced_tso() {
    let (outcome, seen) = observe(store_buffering(true), config(MemoryModel::Tso));
    assert_eq!(outcome.report.stats.executions, 3);
    assert!(!seen.reads.contains(&vec![vec![0], vec![0]]));
}

/// Message passing
///
/// # Scenario
///
/// T0: x = 1; y =rel 1    T1: a =acq y; b = x
///
/// # Expected
///
/// With release/acquire, seeing the flag implies seeing the data.
/// With relaxed accesses, the stale outcome (1, 0) is allowed.
#[test]
fn test_message_passing() {
    let mp = |release: &str, acquire: &str| {
        two_threads(
            vec![store("x", 1, "relaxed"), store("y", 1, release)],
            vec![load(1, "y", acquire), load(2, "x", "relaxed")],
        )
    };

    let (outcome, seen) = observe(mp("release", "acquire"), config(MemoryModel::Ra));
    assert_eq!(outcome.report.stats.executions, 3);
    assert!(seen.reads.iter().all(|r| r[1] != vec![1, 0]));

    let (outcome, seen) = observe(mp("relaxed", "relaxed"), config(MemoryModel::Ra));
    assert_eq!(outcome.report.stats.executions, 4);
    assert!(seen.reads.iter().any(|r| r[1] == vec![1, 0]));
}

/// Load buffering
///
/// # Scenario
///
/// T0: a = x; y = 1    T1: b = y; x = 1
///
/// # Expected
///
/// RA keeps porf acyclic, so (1, 1) never happens: 3 executions.
#[test]
fn test_load_buffering_ra() {
    let lb = two_threads(
        vec![load(1, "x", "relaxed"), store("y", 1, "relaxed")],
        vec![load(1, "y", "relaxed"), store("x", 1, "relaxed")],
    );
    let (outcome, seen) = observe(lb, config(MemoryModel::Ra));
    assert_eq!(outcome.report.stats.executions, 3);
    assert!(!seen.reads.contains(&vec![vec![1], vec![1]]));
}

/// Coherence of read-read pairs
///
/// # Scenario
///
/// T0: x = 1; x = 2    T1: a = x; b = x
///
/// # Expected
///
/// The second read never sees an older write than the first: 6 executions.
#[test]
fn test_coherence_read_read() {
    let corr = two_threads(
        vec![store("x", 1, "relaxed"), store("x", 2, "relaxed")],
        vec![load(1, "x", "relaxed"), load(2, "x", "relaxed")],
    );
    for model in [MemoryModel::Sc, MemoryModel::Ra] {
        let (outcome, seen) = observe(corr.clone(), config(model));
        assert_eq!(outcome.report.stats.executions, 6, "{model:?}");
        assert!(seen.reads.iter().all(|r| r[1][0] <= r[1][1]), "{model:?}");
    }
}

fn iriw() -> Json {
    json!({
        "globals": [{"name": "x"}, {"name": "y"}],
        "functions": [
            {"name": "wx", "body": [store("x", 1, "release")]},
            {"name": "wy", "body": [store("y", 1, "release")]},
            {"name": "rxy", "body": [load(1, "x", "acquire"), load(2, "y", "acquire")]},
            {"name": "ryx", "body": [load(1, "y", "acquire"), load(2, "x", "acquire")]}
        ],
        "threads": [{"function": "wx"}, {"function": "wy"}, {"function": "rxy"}, {"function": "ryx"}]
    })
}

/// Independent reads of independent writes
///
/// # Scenario
///
/// T0: x = 1    T1: y = 1    T2: a = x; b = y    T3: c = y; d = x
///
/// # Expected
///
/// SC and TSO are multi-copy atomic and forbid the readers disagreeing on
/// the order of the writes: 15 executions. RA and LKMM allow it: 16.
#[test]
fn test_independent_reads_of_independent_writes() {
    let disagree = vec![vec![], vec![], vec![1, 0], vec![1, 0]];
    for (model, expected) in [(MemoryModel::Sc, 15), (MemoryModel::Tso, 15), (MemoryModel::Ra, 16), (MemoryModel::Lkmm, 16)] {
        let (outcome, seen) = observe(iriw(), config(model));
        assert_eq!(outcome.report.stats.executions, expected, "{model:?}");
        assert_eq!(seen.reads.contains(&disagree), expected == 16, "{model:?}");
    }
}

/// Re-runs the oracle on every complete execution
struct Recheck {
    oracle: Oracle,
    accepted: u64,
    rejected: u64,
}

impl ExecutionObserver for Recheck {
    fn on_complete(&mut self, graph: &ExecutionGraph) {
        if self.oracle.is_consistent(graph) {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

/// Every reported execution is consistent
///
/// # Expected
///
/// Under each model, the oracle accepts every complete graph handed to the
/// observer, and there is one such graph per counted execution.
#[test]
fn test_complete_executions_pass_recheck() {
    let shapes = [
        store_buffering(false),
        store_buffering(true),
        two_threads(
            vec![store("x", 1, "relaxed"), store("y", 1, "release")],
            vec![load(1, "y", "acquire"), load(2, "x", "relaxed")],
        ),
        two_threads(
            vec![load(1, "x", "relaxed"), store("y", 1, "relaxed")],
            vec![load(1, "y", "relaxed"), store("x", 1, "relaxed")],
        ),
        iriw(),
    ];
    for model in [MemoryModel::Sc, MemoryModel::Tso, MemoryModel::Ra, MemoryModel::Lkmm] {
        for shape in &shapes {
            let mut recheck = Recheck { oracle: Oracle::new(model), accepted: 0, rejected: 0 };
            let outcome = Checker::new(config(model))
                .check_with(&program(shape.clone()), &mut recheck)
                .expect("check runs");
            assert_eq!(recheck.rejected, 0, "{model:?}");
            assert_eq!(recheck.accepted, outcome.report.stats.executions, "{model:?}");
        }
    }
}

/// A final store stays last in coherence
///
/// # Scenario
///
/// T0: x = 1 (final)    T1: x = 2
///
/// # Expected
///
/// Without the annotation both coherence orders are explored. With it only
/// the order ending in x = 1 survives.
#[test]
fn test_final_store_pins_coherence() {
    let racing = |first: Json| two_threads(vec![first], vec![store("x", 2, "relaxed")]);

    let (outcome, seen) = observe(racing(store("x", 1, "relaxed")), config(MemoryModel::Ra));
    assert_eq!(outcome.report.stats.executions, 2);
    assert!(seen.finals.contains(&vec![2, 0]));

    let pinned = json!({"op": "final_store", "addr": {"global": "x"}, "value": {"const": 1}, "order": "relaxed"});
    for model in [MemoryModel::Sc, MemoryModel::Ra] {
        let (outcome, seen) = observe(racing(pinned.clone()), config(model));
        assert!(outcome.report.is_clean(), "{model:?}");
        assert_eq!(outcome.report.stats.executions, 1, "{model:?}");
        assert_eq!(seen.finals, vec![vec![1, 0]], "{model:?}");
    }
}
