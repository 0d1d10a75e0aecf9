//! Pending revisit records

use super::revisit::Revisit;
use crate::domain::event::Stamp;
use std::collections::BTreeMap;

/// Records keyed by the stamp the graph is cut back to when they resume.
/// The highest stamp resumes first; within one stamp, the newest record.
#[derive(Debug, Clone, Default)]
pub struct Worklist {
    records: BTreeMap<Stamp, Vec<Revisit>>,
    len: usize,
}

impl Worklist {
    /// Queue `revisit` for resumption at `stamp`
    pub fn push(&mut self, stamp: Stamp, revisit: Revisit) {
        self.records.entry(stamp).or_default().push(revisit);
        self.len += 1;
    }

    /// Take the next record
    pub fn pop(&mut self) -> Option<(Stamp, Revisit)> {
        let mut bucket = self.records.last_entry()?;
        let stamp = *bucket.key();
        let revisit = bucket.get_mut().pop();
        if bucket.get().is_empty() {
            bucket.remove();
        }
        self.len -= 1;
        revisit.map(|r| (stamp, r))
    }

    /// Number of queued records
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is queued
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
