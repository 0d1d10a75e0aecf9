//! Data races: two accesses to one address from different threads, at least
//! one writing, at least one plain, unordered by happens-before.

use super::hb::HappensBefore;
use crate::domain::event::{Address, EventId, MemoryOrder};
use crate::domain::graph::{Event, ExecutionGraph};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pair of racing accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRace {
    /// Earlier access (by stamp)
    pub first: EventId,
    /// Later access
    pub second: EventId,
    /// Shared address
    pub addr: Address,
}

impl fmt::Display for DataRace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} and {} on {}", self.first, self.second, self.addr)
    }
}

fn writes(graph: &ExecutionGraph, e: &Event) -> bool {
    graph.is_write(e) || ExecutionGraph::store_value(&e.label).is_some()
}

/// First racing pair in insertion order
pub fn find_race(graph: &ExecutionGraph, hb: &HappensBefore) -> Option<DataRace> {
    let accesses: Vec<&Event> = graph
        .events_by_stamp()
        .into_iter()
        .filter(|e| graph.access_location(e).is_some())
        .collect();
    for (j, b) in accesses.iter().enumerate() {
        let loc_b = graph.access_location(b)?;
        for a in &accesses[..j] {
            if a.id.thread == b.id.thread {
                continue;
            }
            let loc_a = graph.access_location(a)?;
            if !loc_a.overlaps(&loc_b) {
                continue;
            }
            if !(writes(graph, a) || writes(graph, b)) {
                continue;
            }
            let plain = a.label.order() == Some(MemoryOrder::Plain) || b.label.order() == Some(MemoryOrder::Plain);
            if plain && !hb.ordered(a.id, b.id) {
                return Some(DataRace { first: a.id, second: b.id, addr: loc_b.addr });
            }
        }
    }
    None
}
