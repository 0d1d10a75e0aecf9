//! Vector Clock Implementation
//!
//! A view of an execution graph: for every thread, the length of the
//! program-order prefix that is known to precede some event.
//!
//! # Theory
//!
//! Given the view `V(b)` of event b and another event a:
//! - a precedes b iff `a.index < V(b)[a.thread]` and `a != b`
//! - a and b are unordered if neither precedes the other
//!
//! Views are joined element-wise, so the porf and happens-before relations are
//! computed by a single pass that merges predecessor views.

use crate::domain::event::{EventId, ThreadId};
use std::fmt;

/// Per-thread prefix lengths
///
/// # Example
///
/// ```text
/// T0: [2, 1, 0]  (T0:0, T0:1 and T1:0 precede, nothing of T2)
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct VectorClock {
    clocks: Vec<usize>,
}

impl VectorClock {
    /// Create a clock with room for `threads` entries, all zero
    #[inline]
    pub fn new(threads: usize) -> Self {
        Self { clocks: vec![0; threads] }
    }

    /// Prefix length recorded for `thread`
    #[inline]
    pub fn get(&self, thread: ThreadId) -> usize {
        self.clocks.get(thread.as_usize()).copied().unwrap_or(0)
    }

    /// Set the prefix length of `thread`, growing the clock if needed
    #[inline]
    pub fn set(&mut self, thread: ThreadId, value: usize) {
        let idx = thread.as_usize();
        if idx >= self.clocks.len() {
            self.clocks.resize(idx + 1, 0);
        }
        self.clocks[idx] = value;
    }

    /// Include `event` and its program-order prefix
    #[inline]
    pub fn include(&mut self, event: EventId) {
        if self.get(event.thread) <= event.index {
            self.set(event.thread, event.index + 1);
        }
    }

    /// Merge with another vector clock (element-wise max)
    ///
    /// ```text
    /// self:  [3, 1, 2]
    /// other: [2, 5]
    /// result:[3, 5, 2]
    /// ```
    pub fn merge(&mut self, other: &Self) {
        if other.clocks.len() > self.clocks.len() {
            self.clocks.resize(other.clocks.len(), 0);
        }
        for (mine, theirs) in self.clocks.iter_mut().zip(&other.clocks) {
            *mine = (*mine).max(*theirs);
        }
    }

    /// Whether `event` lies inside the view
    #[inline]
    pub fn contains(&self, event: EventId) -> bool {
        event.index < self.get(event.thread)
    }

    /// Whether every prefix of `other` is included in `self`
    pub fn includes(&self, other: &Self) -> bool {
        other
            .clocks
            .iter()
            .enumerate()
            .all(|(i, &v)| v <= self.get(ThreadId(i)))
    }

    /// Number of events inside the view
    pub fn size(&self) -> usize {
        self.clocks.iter().sum()
    }
}

impl fmt::Debug for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VC[")?;
        for (i, &val) in self.clocks.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(t: usize, i: usize) -> EventId {
        EventId::new(ThreadId(t), i)
    }

    #[test]
    fn test_vector_clock_init() {
        let vc = VectorClock::new(3);
        for t in 0..3 {
            assert_eq!(vc.get(ThreadId(t)), 0);
        }
        assert_eq!(vc.get(ThreadId(7)), 0);
    }

    #[test]
    fn test_include() {
        let mut vc = VectorClock::new(2);
        vc.include(ev(0, 2));
        assert!(vc.contains(ev(0, 0)));
        assert!(vc.contains(ev(0, 2)));
        assert!(!vc.contains(ev(0, 3)));

        vc.include(ev(0, 1));
        assert_eq!(vc.get(ThreadId(0)), 3);
    }

    #[test]
    fn test_merge() {
        let mut vc1 = VectorClock::new(3);
        vc1.set(ThreadId(0), 3);
        vc1.set(ThreadId(1), 1);
        vc1.set(ThreadId(2), 2);

        let mut vc2 = VectorClock::new(2);
        vc2.set(ThreadId(0), 2);
        vc2.set(ThreadId(1), 5);

        vc1.merge(&vc2);

        assert_eq!(vc1.get(ThreadId(0)), 3);
        assert_eq!(vc1.get(ThreadId(1)), 5);
        assert_eq!(vc1.get(ThreadId(2)), 2);
        assert_eq!(vc1.size(), 10);
    }

    #[test]
    fn test_includes() {
        let mut small = VectorClock::new(2);
        small.set(ThreadId(0), 1);

        let mut big = VectorClock::new(3);
        big.set(ThreadId(0), 2);
        big.set(ThreadId(2), 1);

        assert!(big.includes(&small));
        assert!(!small.includes(&big));
    }

    #[test]
    fn test_grows_on_set() {
        let mut vc = VectorClock::new(0);
        vc.set(ThreadId(4), 2);
        assert!(vc.contains(ev(4, 1)));
        assert_eq!(format!("{vc:?}"), "VC[0, 0, 0, 0, 2]");
    }
}
