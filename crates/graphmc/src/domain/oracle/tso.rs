//! Total store order
//!
//! Two conditions:
//! - per-location SC: acyclic(po-loc ∪ rf ∪ co ∪ fr)
//! - acyclic(ppo ∪ rfe ∪ co ∪ fr), where ppo is program order minus
//!   store→load pairs; full fences and locked instructions restore the
//!   order transitively because they are ordered with both sides.

use super::cycle::{add_communication, add_structural, is_ordering_point, Digraph};
use super::Inconsistency;
use crate::domain::event::{EventId, EventLabel};
use crate::domain::graph::{Event, ExecutionGraph};
use std::collections::HashMap;

fn store_only(graph: &ExecutionGraph, e: &Event) -> bool {
    match e.label {
        EventLabel::Write { .. } => true,
        EventLabel::LockRelease { .. } => !graph.is_lock_aware(),
        _ => false,
    }
}

fn load_only(e: &Event) -> bool {
    matches!(e.label, EventLabel::Read { .. })
}

fn check_uniproc(graph: &ExecutionGraph) -> Result<(), Inconsistency> {
    let mut rel = Digraph::new(graph.events().map(|e| e.id));
    for t in graph.threads() {
        let mut last: HashMap<u64, EventId> = HashMap::new();
        for e in graph.thread_events(t) {
            if let Some(loc) = graph.access_location(e) {
                if let Some(prev) = last.insert(loc.addr.0, e.id) {
                    rel.add_edge(prev, e.id);
                }
            }
        }
    }
    add_communication(graph, &mut rel, false);
    if rel.is_acyclic() {
        Ok(())
    } else {
        Err(Inconsistency::Coherence)
    }
}

/// Check `graph` against TSO.
pub fn check(graph: &ExecutionGraph, lock_edges: &[(EventId, EventId)]) -> Result<(), Inconsistency> {
    check_uniproc(graph)?;

    let mut rel = Digraph::new(graph.events().map(|e| e.id));
    for t in graph.threads() {
        let points: Vec<&Event> = graph
            .thread_events(t)
            .iter()
            .filter(|e| is_ordering_point(graph, &e.label, graph.access_location(e).is_some()))
            .collect();
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                if !(store_only(graph, a) && load_only(b)) {
                    rel.add_edge(a.id, b.id);
                }
            }
        }
    }
    add_structural(graph, &mut rel, false);
    add_communication(graph, &mut rel, true);
    for (release, acquire) in lock_edges {
        rel.add_edge(*release, *acquire);
    }
    if rel.is_acyclic() {
        Ok(())
    } else {
        Err(Inconsistency::TotalStoreOrder)
    }
}
