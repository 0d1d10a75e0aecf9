//! Helpers shared by the integration tests

#![allow(dead_code)]

use graphmc::{CheckOutcome, Checker, ExecutionGraph, ExecutionObserver, ExplorerConfig, Program};
use serde_json::Value as Json;

/// Build a program from its JSON form
pub fn program(json: Json) -> Program {
    serde_json::from_value(json).expect("test program is well-formed")
}

/// Check `json` under `config`
pub fn check(json: Json, config: ExplorerConfig) -> CheckOutcome {
    Checker::new(config).check(&program(json)).expect("check runs")
}

/// Values observed in every complete execution
#[derive(Debug, Default)]
pub struct Outcomes {
    /// Per execution, the values each thread read, threads in id order
    pub reads: Vec<Vec<Vec<u64>>>,
    /// Per execution, the final value of every global in declaration order
    pub finals: Vec<Vec<u64>>,
}

impl ExecutionObserver for Outcomes {
    fn on_complete(&mut self, graph: &ExecutionGraph) {
        self.reads.push(graph.threads().map(|t| graph.read_values(t)).collect());
        self.finals.push(graph.layout().globals().map(|g| graph.final_value(g.addr)).collect());
    }
}

/// Check `json` under `config`, recording what each execution observed
pub fn observe(json: Json, config: ExplorerConfig) -> (CheckOutcome, Outcomes) {
    let mut outcomes = Outcomes::default();
    let outcome = Checker::new(config)
        .check_with(&program(json), &mut outcomes)
        .expect("check runs");
    (outcome, outcomes)
}

/// Store of a constant to a global
pub fn store(global: &str, value: u64, order: &str) -> Json {
    serde_json::json!({
        "op": "store", "addr": {"global": global}, "value": {"const": value}, "order": order
    })
}

/// Load of a global into `dst`
pub fn load(dst: usize, global: &str, order: &str) -> Json {
    serde_json::json!({"op": "load", "dst": dst, "addr": {"global": global}, "order": order})
}

/// Lock or unlock of a global mutex
pub fn lock(op: &str, global: &str) -> Json {
    serde_json::json!({"op": op, "addr": {"global": global}})
}
