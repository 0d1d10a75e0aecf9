//! Acyclicity checks over explicit relations.

use crate::domain::event::{EventId, EventLabel};
use crate::domain::graph::{ExecutionGraph, WriteRef};
use std::collections::HashMap;

/// Directed graph over events
#[derive(Debug, Clone, Default)]
pub struct Digraph {
    index: HashMap<EventId, usize>,
    adj: Vec<Vec<usize>>,
}

impl Digraph {
    /// Graph with the given nodes and no edges
    pub fn new(nodes: impl IntoIterator<Item = EventId>) -> Self {
        let index: HashMap<EventId, usize> = nodes.into_iter().enumerate().map(|(i, id)| (id, i)).collect();
        let adj = vec![Vec::new(); index.len()];
        Self { index, adj }
    }

    /// Add `from → to`; edges touching unknown nodes are ignored
    pub fn add_edge(&mut self, from: EventId, to: EventId) {
        if let (Some(&a), Some(&b)) = (self.index.get(&from), self.index.get(&to)) {
            self.adj[a].push(b);
        }
    }

    /// Kahn's algorithm
    pub fn is_acyclic(&self) -> bool {
        let mut indegree = vec![0usize; self.adj.len()];
        for targets in &self.adj {
            for &t in targets {
                indegree[t] += 1;
            }
        }
        let mut ready: Vec<usize> = (0..self.adj.len()).filter(|&i| indegree[i] == 0).collect();
        let mut seen = 0;
        while let Some(n) = ready.pop() {
            seen += 1;
            for &t in &self.adj[n] {
                indegree[t] -= 1;
                if indegree[t] == 0 {
                    ready.push(t);
                }
            }
        }
        seen == self.adj.len()
    }
}

/// Create→start and finish→join edges, plus immediate program order when
/// `program_order` is set
pub fn add_structural(graph: &ExecutionGraph, rel: &mut Digraph, program_order: bool) {
    for e in graph.events() {
        for p in graph.structural_preds(e) {
            if program_order || p.thread != e.id.thread {
                rel.add_edge(p, e.id);
            }
        }
    }
}

/// Whether the rf edge into `e` crosses threads
fn external(e: EventId, source: WriteRef) -> bool {
    source.event().map_or(true, |w| w.thread != e.thread)
}

/// rf (optionally external only), immediate co and fr edges
pub fn add_communication(graph: &ExecutionGraph, rel: &mut Digraph, external_rf_only: bool) {
    for (_, order) in graph.coherence_orders() {
        for pair in order.windows(2) {
            rel.add_edge(pair[0], pair[1]);
        }
    }
    for e in graph.events().filter(|e| graph.is_read(e)) {
        let (Some(source), Some(loc)) = (e.rf, e.label.location()) else {
            continue;
        };
        if let WriteRef::Event(w) = source {
            if !external_rf_only || external(e.id, source) {
                rel.add_edge(w, e.id);
            }
        }
        let Some(pos) = graph.co_position(source, loc.addr) else {
            continue;
        };
        let order = graph.coherence(loc.addr);
        let next = order[pos.min(order.len())..].iter().find(|w| **w != e.id);
        if let Some(&w) = next {
            rel.add_edge(e.id, w);
        }
    }
}

/// Whether the event takes part in TSO preserved program order
pub fn is_ordering_point(graph: &ExecutionGraph, label: &EventLabel, located: bool) -> bool {
    match label {
        EventLabel::Fence(kind) => kind.is_full(),
        EventLabel::ThreadStart { .. }
        | EventLabel::ThreadFinish
        | EventLabel::ThreadCreate { .. }
        | EventLabel::ThreadJoin { .. } => true,
        EventLabel::LockAcquire { .. } | EventLabel::LockRelease { .. } => !graph.is_lock_aware(),
        _ => located,
    }
}
