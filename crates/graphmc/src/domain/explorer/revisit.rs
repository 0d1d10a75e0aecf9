//! Revisit records and the maximality condition for backward revisits
//!
//! When a new write `w` could be read by an older read `r`, the revisited
//! graph keeps everything added up to `r` plus the porf-prefix of `w`; the
//! rest is deleted. To explore each graph once, the revisit happens only if
//! `r` and every deleted event were added *maximally*: a read took the
//! coherence-latest write it could see, a write went to the end of
//! coherence. Any other revisit reproduces a graph reachable elsewhere.

use crate::domain::event::{EventId, EventLabel, Stamp};
use crate::domain::graph::{Event, ExecutionGraph, VectorClock, WriteRef};

/// A choice left to explore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revisit {
    /// `read` takes another source
    ReadsFrom {
        /// Read to redirect
        read: EventId,
        /// Its next source
        source: WriteRef,
    },
    /// `write` takes another coherence position
    Coherence {
        /// Write to move
        write: EventId,
        /// Its next coherence predecessor
        after: WriteRef,
    },
    /// `write` is read by the earlier `read`
    Backward {
        /// Earlier read
        read: EventId,
        /// Later write it will read
        write: EventId,
    },
}

/// Which events survive a backward revisit of `read` by a write
#[derive(Debug, Clone)]
pub struct RevisitView {
    read_stamp: Stamp,
    prefix: VectorClock,
}

impl RevisitView {
    /// View for `read` revisited by the write whose porf-prefix is `prefix`
    pub fn new(graph: &ExecutionGraph, read: EventId, prefix: VectorClock) -> Self {
        Self { read_stamp: graph.event(read).stamp, prefix }
    }

    /// Whether the write's porf-prefix contains `id`
    pub fn in_prefix(&self, id: EventId) -> bool {
        self.prefix.contains(id)
    }

    fn kept_id(&self, graph: &ExecutionGraph, id: EventId) -> bool {
        self.in_prefix(id) || graph.get(id).map_or(false, |e| e.stamp <= self.read_stamp)
    }

    /// Whether `e` is in the restricted graph. Threads spawned by a kept
    /// creation keep their start.
    pub fn keeps(&self, graph: &ExecutionGraph, e: &Event) -> bool {
        if self.kept_id(graph, e.id) {
            return true;
        }
        match e.label {
            EventLabel::ThreadStart { parent: Some(parent) } => self.kept_id(graph, parent),
            _ => false,
        }
    }
}

/// Whether `write` may revisit `read`
pub fn is_maximal(graph: &ExecutionGraph, view: &RevisitView, read: EventId, write: EventId) -> bool {
    std::iter::once(graph.event(read))
        .chain(graph.events().filter(|e| !view.keeps(graph, e)))
        .all(|e| added_maximally(graph, view, e, write))
}

fn added_maximally(graph: &ExecutionGraph, view: &RevisitView, e: &Event, write: EventId) -> bool {
    let Some(loc) = graph.access_location(e) else {
        return true;
    };
    // Events visible when `e` was added, as far as the revisited graph goes
    let visible = |id: EventId| {
        id != write
            && id != e.id
            && (view.in_prefix(id) || graph.get(id).map_or(false, |x| x.stamp <= e.stamp))
    };
    let order = graph.coherence(loc.addr);
    let later_visible = |from: WriteRef| {
        let pos = graph.co_position(from, loc.addr).unwrap_or(0);
        order.iter().skip(pos).any(|w| visible(*w))
    };

    if graph.is_read(e) {
        let Some(source) = e.rf else {
            return true;
        };
        if matches!(source, WriteRef::Event(w) if !visible(w)) || later_visible(source) {
            return false;
        }
    }
    if graph.is_write(e) && graph.is_placed(e.id) && later_visible(WriteRef::Event(e.id)) {
        return false;
    }
    true
}
