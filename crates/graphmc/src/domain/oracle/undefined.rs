//! Undefined memory behaviour.

use super::hb::HappensBefore;
use crate::domain::event::{Address, EventId, EventLabel, Location};
use crate::domain::graph::{Event, ExecutionGraph, Placement, WriteRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of undefined behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedKind {
    /// Access to memory that is neither a global nor a live heap block
    Unallocated,
    /// Address not aligned to the access width
    Misaligned,
    /// Access running past the end of its global or heap block
    OutOfBounds,
    /// Heap read that sees no write
    UninitializedRead,
    /// Access after the block was freed
    UseAfterFree,
    /// Access unordered with the free of its block
    ConcurrentFree,
    /// Second free of one block
    DoubleFree,
    /// Free of an address that no `Malloc` returned
    InvalidFree,
    /// Release of a lock the thread does not hold
    UnlockNotHeld,
}

impl fmt::Display for UndefinedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unallocated => "access to unallocated memory",
            Self::Misaligned => "misaligned access",
            Self::OutOfBounds => "out-of-bounds access",
            Self::UninitializedRead => "read of uninitialised memory",
            Self::UseAfterFree => "use after free",
            Self::ConcurrentFree => "access racing with free",
            Self::DoubleFree => "double free",
            Self::InvalidFree => "free of a non-heap address",
            Self::UnlockNotHeld => "unlock of a lock not held",
        };
        f.write_str(text)
    }
}

/// An undefined access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UndefinedAccess {
    /// What went wrong
    pub kind: UndefinedKind,
    /// Offending event
    pub event: EventId,
    /// Address involved
    pub addr: Address,
}

struct HeapBlock {
    start: Address,
    size: u64,
}

impl HeapBlock {
    const fn contains(&self, loc: &Location) -> bool {
        loc.addr.0 >= self.start.0 && loc.addr.0 < self.start.0 + self.size
    }

    const fn covers(&self, loc: &Location) -> bool {
        self.contains(loc) && loc.addr.0 + loc.size as u64 <= self.start.0 + self.size
    }
}

fn holds_lock(graph: &ExecutionGraph, release: &Event, addr: Address) -> bool {
    graph.thread_events(release.id.thread)[..release.id.index]
        .iter()
        .rev()
        .find_map(|e| match e.label {
            EventLabel::LockAcquire { addr: a } if a == addr => {
                Some(graph.is_lock_aware() || e.written.is_some())
            }
            EventLabel::LockRelease { addr: a } if a == addr => Some(false),
            _ => None,
        })
        .unwrap_or(false)
}

/// First undefined access in insertion order
pub fn find_undefined(graph: &ExecutionGraph, hb: &HappensBefore) -> Option<UndefinedAccess> {
    let blocks: Vec<HeapBlock> = graph
        .events()
        .filter_map(|e| match e.label {
            EventLabel::Malloc { size } => Some(HeapBlock { start: e.id.heap_address(), size }),
            _ => None,
        })
        .collect();
    let frees: Vec<(&Event, Address)> = graph
        .events()
        .filter_map(|e| match e.label {
            EventLabel::Free { addr } => Some((e, addr)),
            _ => None,
        })
        .collect();

    for e in graph.events_by_stamp() {
        let undefined = |kind, addr| Some(UndefinedAccess { kind, event: e.id, addr });
        if let EventLabel::Free { addr } = e.label {
            if !blocks.iter().any(|b| b.start == addr) {
                return undefined(UndefinedKind::InvalidFree, addr);
            }
            if frees.iter().any(|(f, a)| *a == addr && f.stamp < e.stamp) {
                return undefined(UndefinedKind::DoubleFree, addr);
            }
            continue;
        }
        if let EventLabel::LockRelease { addr } = e.label {
            if !holds_lock(graph, e, addr) {
                return undefined(UndefinedKind::UnlockNotHeld, addr);
            }
        }
        let Some(loc) = graph.access_location(e) else {
            continue;
        };
        if !loc.addr.is_aligned(loc.size) {
            return undefined(UndefinedKind::Misaligned, loc.addr);
        }
        match graph.layout().place(&loc) {
            Placement::Inside(_) => continue,
            Placement::Straddles(_) => return undefined(UndefinedKind::OutOfBounds, loc.addr),
            Placement::Outside => {}
        }
        let Some(block) = blocks.iter().find(|b| b.contains(&loc)) else {
            return undefined(UndefinedKind::Unallocated, loc.addr);
        };
        if !block.covers(&loc) {
            return undefined(UndefinedKind::OutOfBounds, loc.addr);
        }
        for (free, _) in frees.iter().filter(|(_, a)| *a == block.start) {
            if hb.before(free.id, e.id) {
                return undefined(UndefinedKind::UseAfterFree, loc.addr);
            }
            if !hb.before(e.id, free.id) {
                return undefined(UndefinedKind::ConcurrentFree, loc.addr);
            }
        }
        if graph.is_read(e) && e.rf == Some(WriteRef::Init) {
            return undefined(UndefinedKind::UninitializedRead, loc.addr);
        }
    }
    None
}
