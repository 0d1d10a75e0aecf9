//! Undo log
//!
//! Every structural mutation of the graph records its inverse here, tagged
//! with the stamp of the event whose commit caused it. Entries are kept in
//! non-decreasing stamp order, so truncating to a stamp is a pop loop.

use crate::domain::event::{Address, EventId, Stamp, ThreadId};

/// Inverse of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoEntry {
    /// A thread slot was opened
    Spawn {
        /// Opened slot
        thread: ThreadId,
        /// Stamp of its `ThreadStart`
        stamp: Stamp,
    },
    /// An event was appended to its thread
    Append {
        /// Appended event
        id: EventId,
        /// Its stamp
        stamp: Stamp,
    },
    /// A write was inserted into a coherence order
    Place {
        /// Location
        addr: Address,
        /// Inserted write
        id: EventId,
        /// Stamp of the commit that placed it
        stamp: Stamp,
    },
}

impl UndoEntry {
    /// Stamp the entry belongs to
    pub const fn stamp(&self) -> Stamp {
        match self {
            Self::Spawn { stamp, .. } | Self::Append { stamp, .. } | Self::Place { stamp, .. } => *stamp,
        }
    }
}

/// Stack of inverses
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    /// Record an inverse
    pub fn push(&mut self, entry: UndoEntry) {
        debug_assert!(
            self.entries.last().map_or(true, |last| last.stamp() <= entry.stamp()),
            "undo log must stay stamp-ordered"
        );
        self.entries.push(entry);
    }

    /// Pop the newest entry if its stamp is above `stamp`
    pub fn pop_above(&mut self, stamp: Stamp) -> Option<UndoEntry> {
        if self.entries.last()?.stamp() > stamp {
            self.entries.pop()
        } else {
            None
        }
    }

    /// Pop the newest entry if it is a placement made at exactly `stamp`
    pub fn pop_placement_at(&mut self, stamp: Stamp) -> Option<UndoEntry> {
        match self.entries.last()? {
            UndoEntry::Place { stamp: s, .. } if *s == stamp => self.entries.pop(),
            _ => None,
        }
    }

    /// Forget the newest placement of `id`
    pub fn forget_placement(&mut self, id: EventId) {
        if let Some(pos) = self
            .entries
            .iter()
            .rposition(|e| matches!(e, UndoEntry::Place { id: placed, .. } if *placed == id))
        {
            self.entries.remove(pos);
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> EventId {
        EventId::new(ThreadId(0), i)
    }

    #[test]
    fn test_pop_above() {
        let mut log = UndoLog::default();
        log.push(UndoEntry::Append { id: id(0), stamp: 0 });
        log.push(UndoEntry::Append { id: id(1), stamp: 1 });
        log.push(UndoEntry::Place { addr: Address(8), id: id(1), stamp: 1 });
        log.push(UndoEntry::Append { id: id(2), stamp: 2 });

        assert_eq!(log.pop_above(0), Some(UndoEntry::Append { id: id(2), stamp: 2 }));
        assert!(log.pop_placement_at(1).is_some());
        assert!(log.pop_placement_at(1).is_none());
        assert!(log.pop_above(1).is_none());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_forget_placement() {
        let mut log = UndoLog::default();
        log.push(UndoEntry::Place { addr: Address(8), id: id(1), stamp: 1 });
        log.push(UndoEntry::Append { id: id(2), stamp: 2 });
        log.forget_placement(id(1));
        assert_eq!(log.len(), 1);
    }
}
