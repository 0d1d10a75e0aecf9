//! Sequential consistency: acyclic(po ∪ rf ∪ co ∪ fr).

use super::cycle::{add_communication, add_structural, Digraph};
use super::Inconsistency;
use crate::domain::event::EventId;
use crate::domain::graph::ExecutionGraph;

/// Check `graph` against SC, with `lock_edges` ordering critical sections.
pub fn check(graph: &ExecutionGraph, lock_edges: &[(EventId, EventId)]) -> Result<(), Inconsistency> {
    let mut rel = Digraph::new(graph.events().map(|e| e.id));
    add_structural(graph, &mut rel, true);
    add_communication(graph, &mut rel, false);
    for (release, acquire) in lock_edges {
        rel.add_edge(*release, *acquire);
    }
    if rel.is_acyclic() {
        Ok(())
    } else {
        Err(Inconsistency::SequentialConsistency)
    }
}
