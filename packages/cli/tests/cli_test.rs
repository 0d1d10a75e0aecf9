//! Integration Test: the graphmc binary
//!
//! Runs the built binary on programs written to temporary files and checks
//! exit codes and output.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const STORE_BUFFERING: &str = r#"{
    "name": "sb",
    "globals": [{"name": "x"}, {"name": "y"}],
    "functions": [
        {"name": "t0", "body": [
            {"op": "store", "addr": {"global": "x"}, "value": {"const": 1}},
            {"op": "load", "dst": 1, "addr": {"global": "y"}}
        ]},
        {"name": "t1", "body": [
            {"op": "store", "addr": {"global": "y"}, "value": {"const": 1}},
            {"op": "load", "dst": 1, "addr": {"global": "x"}}
        ]}
    ],
    "threads": [{"function": "t0"}, {"function": "t1"}]
}"#;

const RACY: &str = r#"{
    "globals": [{"name": "x"}],
    "functions": [
        {"name": "w", "body": [{"op": "store", "addr": {"global": "x"}, "value": {"const": 1}, "order": "plain"}]},
        {"name": "r", "body": [{"op": "load", "dst": 1, "addr": {"global": "x"}, "order": "plain"}]}
    ],
    "threads": [{"function": "w"}, {"function": "r"}]
}"#;

const FAILING_ASSERT: &str = r#"{
    "functions": [{"name": "main", "body": [
        {"op": "assert", "cond": {"const": 0}, "message": "always fails"}
    ]}],
    "threads": [{"function": "main"}]
}"#;

const SPIN: &str = r#"{
    "globals": [{"name": "flag"}],
    "functions": [
        {"name": "setter", "body": [
            {"op": "store", "addr": {"global": "flag"}, "value": {"const": 1}, "order": "release"}
        ]},
        {"name": "waiter", "body": [
            {"op": "load", "dst": 0, "addr": {"global": "flag"}, "order": "acquire"},
            {"op": "branch", "cond": {"ne": [{"reg": 0}, {"const": 1}]}, "target": 0}
        ]}
    ],
    "threads": [{"function": "setter"}, {"function": "waiter"}]
}"#;

fn program_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn graphmc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_graphmc")).args(args).output().unwrap()
}

fn check(json: &str, flags: &[&str]) -> Output {
    let file = program_file(json);
    let path = file.path().to_str().unwrap().to_string();
    let mut args = vec!["check", path.as_str()];
    args.extend_from_slice(flags);
    graphmc(&args)
}

#[test]
fn test_clean_program_exits_zero() {
    let output = check(STORE_BUFFERING, &["--model", "sc"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 complete"), "{stdout}");
    assert!(stdout.contains("No errors were detected."));
}

#[test]
fn test_json_report() {
    let output = check(STORE_BUFFERING, &["--model", "ra", "--exhaustive", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["report"]["stats"]["executions"], 4);
    assert_eq!(outcome["report"]["model"], "ra");
    assert_eq!(outcome["config"]["stop_policy"], "exhaustive");
}

#[test]
fn test_violation_exit_codes() {
    assert_eq!(check(FAILING_ASSERT, &[]).status.code(), Some(10));
    assert_eq!(check(RACY, &[]).status.code(), Some(11));
}

#[test]
fn test_bound_reached_is_success() {
    let output = check(STORE_BUFFERING, &["--max-executions", "1"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("exploration incomplete"));
}

#[test]
fn test_unreadable_program_is_usage_error() {
    let output = graphmc(&["check", "/nonexistent/program.json"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load"));

    let output = check("{ not json", &[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_bad_flag_is_usage_error() {
    let file = program_file(STORE_BUFFERING);
    let path = file.path().to_str().unwrap().to_string();
    let output = graphmc(&["check", path.as_str(), "--model", "power"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_summarize_lists_spin_loops() {
    let file = program_file(SPIN);
    let path = file.path().to_str().unwrap().to_string();
    let output = graphmc(&["summarize", path.as_str()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("summarised  waiter:0..1"));
}
