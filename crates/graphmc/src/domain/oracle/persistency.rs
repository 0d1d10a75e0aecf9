//! Crash points for persistency checking.
//!
//! A durable state picks, for every persistent global, `Init` or one of its
//! placed writes; everything coherence-before the pick is persisted too.
//! Barriers constrain the choice: if any write hb-after a barrier is
//! persisted, every write hb-before it must be persisted as well.

use super::hb::HappensBefore;
use crate::domain::event::{Address, Annotation, EventId, EventLabel, Value};
use crate::domain::graph::{ExecutionGraph, WriteRef};
use serde::{Deserialize, Serialize};

/// Upper bound on enumerated crash points per execution
pub const MAX_DURABLE_STATES: usize = 1 << 12;

/// Values of the persistent globals after a crash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DurableState {
    /// `(address, value)` per persistent global, in address order
    pub values: Vec<(Address, Value)>,
}

/// Persistent write with its location index and coherence position
struct PersistentWrite {
    id: EventId,
    loc: usize,
    pos: usize,
}

/// Every durable state allowed by the barriers of `graph`
pub fn durable_states(graph: &ExecutionGraph, hb: &HappensBefore) -> Vec<DurableState> {
    let addrs: Vec<Address> = graph.layout().persistent().map(|g| g.addr).collect();
    if addrs.is_empty() {
        return Vec::new();
    }
    let writes: Vec<PersistentWrite> = addrs
        .iter()
        .enumerate()
        .flat_map(|(loc, addr)| {
            graph
                .coherence(*addr)
                .iter()
                .enumerate()
                .map(move |(i, id)| PersistentWrite { id: *id, loc, pos: i + 1 })
        })
        .collect();
    let barriers: Vec<(Vec<&PersistentWrite>, Vec<&PersistentWrite>)> = graph
        .events()
        .filter(|e| matches!(e.label, EventLabel::Annotation(Annotation::PersistencyBarrier)))
        .map(|b| {
            let before = writes.iter().filter(|w| hb.before(w.id, b.id)).collect();
            let after = writes.iter().filter(|w| hb.before(b.id, w.id)).collect();
            (before, after)
        })
        .collect();

    let limits: Vec<usize> = addrs.iter().map(|a| graph.coherence(*a).len()).collect();
    let mut choice = vec![0usize; addrs.len()];
    let mut states = Vec::new();
    loop {
        let persisted = |w: &PersistentWrite| w.pos <= choice[w.loc];
        let allowed = barriers
            .iter()
            .all(|(before, after)| !after.iter().any(|w| persisted(*w)) || before.iter().all(|w| persisted(*w)));
        if allowed {
            let values = addrs
                .iter()
                .zip(&choice)
                .map(|(addr, &pos)| {
                    let source = if pos == 0 {
                        WriteRef::Init
                    } else {
                        WriteRef::Event(graph.coherence(*addr)[pos - 1])
                    };
                    (*addr, graph.value_of(source, *addr))
                })
                .collect();
            states.push(DurableState { values });
            if states.len() >= MAX_DURABLE_STATES {
                tracing::warn!(limit = MAX_DURABLE_STATES, "durable state enumeration truncated");
                break;
            }
        }
        // odometer
        let mut digit = 0;
        while digit < choice.len() && choice[digit] == limits[digit] {
            choice[digit] = 0;
            digit += 1;
        }
        if digit == choice.len() {
            break;
        }
        choice[digit] += 1;
    }
    states
}
