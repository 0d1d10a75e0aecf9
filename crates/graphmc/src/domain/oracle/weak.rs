//! Release/acquire consistency
//!
//! Per location, with `pos` the coherence position (`Init` = 0):
//! - write-write: `w1 hb w2` implies `pos(w1) < pos(w2)`
//! - write-read: `w hb r` implies `pos(w) <= pos(rf(r))`
//! - read-write: `r hb w` implies `pos(rf(r)) < pos(w)`
//! - read-read: `r1 hb r2` implies `pos(rf(r1)) <= pos(rf(r2))`
//!
//! Seq_cst accesses and fences must additionally admit a total order that
//! contains hb between them and every eco path that they bracket.

use super::cycle::Digraph;
use super::hb::HappensBefore;
use super::Inconsistency;
use crate::domain::event::{Address, EventId, EventLabel};
use crate::domain::graph::{Event, ExecutionGraph, WriteRef};
use std::collections::HashMap;

struct Access {
    id: EventId,
    /// Position of the write itself, for placed writes
    own: Option<usize>,
    /// Position of the reads-from source, for reads
    read: Option<usize>,
}

fn accesses_by_location(graph: &ExecutionGraph) -> HashMap<Address, Vec<Access>> {
    let mut by_loc: HashMap<Address, Vec<Access>> = HashMap::new();
    for e in graph.events() {
        let Some(loc) = graph.access_location(e) else {
            continue;
        };
        let own = graph.co_position(WriteRef::Event(e.id), loc.addr).filter(|_| graph.is_write(e));
        let read = if graph.is_read(e) {
            e.rf.and_then(|source| graph.co_position(source, loc.addr))
        } else {
            None
        };
        if own.is_some() || read.is_some() {
            by_loc.entry(loc.addr).or_default().push(Access { id: e.id, own, read });
        }
    }
    by_loc
}

/// hb-coherence on every location
pub fn check_coherence(graph: &ExecutionGraph, hb: &HappensBefore) -> Result<(), Inconsistency> {
    for accesses in accesses_by_location(graph).values() {
        for a in accesses {
            for b in accesses {
                if a.id == b.id || !hb.before(a.id, b.id) {
                    continue;
                }
                let violated = match (a.own, a.read, b.own, b.read) {
                    (Some(wa), _, Some(wb), _) if wa >= wb => true,
                    (Some(wa), _, _, Some(rb)) if wa > rb => true,
                    (_, Some(ra), Some(wb), _) if ra >= wb => true,
                    (_, Some(ra), _, Some(rb)) if ra > rb => true,
                    _ => false,
                };
                if violated {
                    return Err(Inconsistency::Coherence);
                }
            }
        }
    }
    Ok(())
}

fn is_seq_cst(e: &Event) -> bool {
    match &e.label {
        EventLabel::Fence(kind) => kind.is_full(),
        label => label.order().map_or(false, |o| o.is_seq_cst()),
    }
}

/// Extended coherence edges: rf, co (all pairs) and fr
pub(crate) fn eco_edges(graph: &ExecutionGraph) -> Vec<(EventId, EventId)> {
    let mut edges = Vec::new();
    for (_, order) in graph.coherence_orders() {
        for (i, a) in order.iter().enumerate() {
            for b in &order[i + 1..] {
                edges.push((*a, *b));
            }
        }
    }
    for e in graph.events().filter(|e| graph.is_read(e)) {
        let (Some(source), Some(loc)) = (e.rf, e.label.location()) else {
            continue;
        };
        if let WriteRef::Event(w) = source {
            edges.push((w, e.id));
        }
        if let Some(pos) = graph.co_position(source, loc.addr) {
            let order = graph.coherence(loc.addr);
            for w in order[pos.min(order.len())..].iter().filter(|w| **w != e.id) {
                edges.push((e.id, *w));
            }
        }
    }
    edges
}

/// A total order over seq_cst events must exist.
pub fn check_seq_cst(graph: &ExecutionGraph, hb: &HappensBefore) -> Result<(), Inconsistency> {
    let sc: Vec<EventId> = graph.events().filter(|e| is_seq_cst(e)).map(|e| e.id).collect();
    if sc.len() < 2 {
        return Ok(());
    }
    let mut rel = Digraph::new(sc.iter().copied());
    for &a in &sc {
        for &b in &sc {
            if hb.before(a, b) {
                rel.add_edge(a, b);
            }
        }
    }
    for (x, y) in eco_edges(graph) {
        let from = sc.iter().filter(|&&a| a == x || hb.before(a, x));
        for &a in from {
            for &b in sc.iter().filter(|&&b| b == y || hb.before(y, b)) {
                if a != b {
                    rel.add_edge(a, b);
                }
            }
        }
    }
    if rel.is_acyclic() {
        Ok(())
    } else {
        Err(Inconsistency::SeqCst)
    }
}

/// Check `graph` against the release/acquire model.
pub fn check(graph: &ExecutionGraph, hb: &HappensBefore) -> Result<(), Inconsistency> {
    check_coherence(graph, hb)?;
    check_seq_cst(graph, hb)
}
