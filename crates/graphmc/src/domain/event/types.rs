//! Identifiers and primitive attributes of events.
//!
//! Everything in this module is `Copy` and cheap to compare. The explorer,
//! the oracle and the reductions pass these around by value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value stored in a memory location or returned to a source.
pub type Value = u64;

/// Insertion order of an event in the execution graph.
pub type Stamp = usize;

/// First heap address handed out by `Malloc`.
pub const HEAP_BASE: u64 = 1 << 40;

/// Thread identifier
///
/// Ids are dense and re-used: a spawned thread takes the lowest slot that is
/// free in the current graph, so replays of one prefix always agree on ids.
///
/// # Example
///
/// ```rust
/// use graphmc::domain::event::ThreadId;
///
/// let main = ThreadId::new(0);
/// let worker = ThreadId::new(1);
///
/// assert_ne!(main, worker);
/// assert_eq!(worker.as_usize(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub usize);

impl ThreadId {
    /// Create a new ThreadId
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the raw numeric ID
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Position of an event: its thread and its program-order index.
///
/// Index 0 of every thread is the core-owned `ThreadStart` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    /// Owning thread
    pub thread: ThreadId,
    /// Program-order index inside the thread
    pub index: usize,
}

impl EventId {
    /// Create an event id
    #[inline(always)]
    pub const fn new(thread: ThreadId, index: usize) -> Self {
        Self { thread, index }
    }

    /// The program-order predecessor, if any
    #[inline]
    pub const fn prev(self) -> Option<Self> {
        if self.index == 0 {
            None
        } else {
            Some(Self::new(self.thread, self.index - 1))
        }
    }

    /// Deterministic heap address of the block allocated by this event.
    #[inline]
    pub const fn heap_address(self) -> Address {
        Address(HEAP_BASE + ((self.thread.0 as u64) << 28) + ((self.index as u64) << 16))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.thread, self.index)
    }
}

/// Byte address in the modelled memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    /// Address `offset` bytes further on
    #[inline]
    pub const fn offset(self, offset: u64) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Whether the address lies on the natural boundary of `size`
    #[inline]
    pub const fn is_aligned(self, size: u8) -> bool {
        size == 0 || self.0 % size as u64 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Target of a memory access: base address and width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// First byte
    pub addr: Address,
    /// Width in bytes
    pub size: u8,
}

impl Location {
    /// Width of a lock word
    pub const LOCK_SIZE: u8 = 1;

    /// Create a location
    #[inline]
    pub const fn new(addr: Address, size: u8) -> Self {
        Self { addr, size }
    }

    /// The location of the lock word at `addr`
    #[inline]
    pub const fn lock(addr: Address) -> Self {
        Self::new(addr, Self::LOCK_SIZE)
    }

    /// Whether two locations share at least one byte
    pub const fn overlaps(&self, other: &Self) -> bool {
        let (a0, a1) = (self.addr.0, self.addr.0 + self.size as u64);
        let (b0, b1) = (other.addr.0, other.addr.0 + other.size as u64);
        a0 < b1 && b0 < a1
    }
}

/// Memory-order tag of an access or fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryOrder {
    /// Non-atomic access; races on it are reported
    Plain,
    /// Atomic without synchronisation
    #[default]
    Relaxed,
    /// Acquire
    Acquire,
    /// Release
    Release,
    /// Acquire and release
    AcqRel,
    /// Sequentially consistent
    SeqCst,
}

impl MemoryOrder {
    /// Anything but `Plain`
    #[inline]
    pub const fn is_atomic(self) -> bool {
        !matches!(self, Self::Plain)
    }

    /// Acquire semantics
    #[inline]
    pub const fn is_acquire(self) -> bool {
        matches!(self, Self::Acquire | Self::AcqRel | Self::SeqCst)
    }

    /// Release semantics
    #[inline]
    pub const fn is_release(self) -> bool {
        matches!(self, Self::Release | Self::AcqRel | Self::SeqCst)
    }

    /// `SeqCst`
    #[inline]
    pub const fn is_seq_cst(self) -> bool {
        matches!(self, Self::SeqCst)
    }
}

/// Operation of a read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmwOp {
    /// Wrapping add
    Add(Value),
    /// Wrapping subtract
    Sub(Value),
    /// Unconditional swap
    Exchange(Value),
    /// Compare-and-swap; fails (reads only) when the old value differs
    CompareExchange {
        /// Value required for success
        expected: Value,
        /// Value written on success
        new: Value,
    },
    /// Bitwise and
    And(Value),
    /// Bitwise or
    Or(Value),
    /// Unsigned maximum
    Max(Value),
    /// Unsigned minimum
    Min(Value),
}

impl RmwOp {
    /// The value written after reading `old`, or `None` for a failed CAS.
    ///
    /// ```rust
    /// use graphmc::domain::event::RmwOp;
    ///
    /// assert_eq!(RmwOp::Add(2).apply(3), Some(5));
    /// assert_eq!(RmwOp::CompareExchange { expected: 1, new: 7 }.apply(0), None);
    /// ```
    pub const fn apply(self, old: Value) -> Option<Value> {
        match self {
            Self::Add(v) => Some(old.wrapping_add(v)),
            Self::Sub(v) => Some(old.wrapping_sub(v)),
            Self::Exchange(v) => Some(v),
            Self::CompareExchange { expected, new } => {
                if old == expected {
                    Some(new)
                } else {
                    None
                }
            }
            Self::And(v) => Some(old & v),
            Self::Or(v) => Some(old | v),
            Self::Max(v) => Some(if old > v { old } else { v }),
            Self::Min(v) => Some(if old < v { old } else { v }),
        }
    }
}

/// Kind of a fence event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FenceKind {
    /// Memory fence with an order (`smp_mb` is `Memory(SeqCst)`)
    Memory(MemoryOrder),
    /// Start of an RCU read-side critical section
    RcuReadLock,
    /// End of an RCU read-side critical section
    RcuReadUnlock,
    /// Wait for a grace period
    SynchronizeRcu,
}

impl FenceKind {
    /// Orders earlier reads before later accesses
    pub const fn is_acquire(self) -> bool {
        match self {
            Self::Memory(order) => order.is_acquire(),
            Self::SynchronizeRcu => true,
            Self::RcuReadLock | Self::RcuReadUnlock => false,
        }
    }

    /// Orders earlier accesses before later writes
    pub const fn is_release(self) -> bool {
        match self {
            Self::Memory(order) => order.is_release(),
            Self::SynchronizeRcu => true,
            Self::RcuReadLock | Self::RcuReadUnlock => false,
        }
    }

    /// Full fence in the sequentially consistent sense
    pub const fn is_full(self) -> bool {
        matches!(self, Self::Memory(MemoryOrder::SeqCst) | Self::SynchronizeRcu)
    }
}

/// Why a thread stopped without finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The per-thread event bound was hit
    Bound,
    /// The source answered `Blocked`
    Source,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_address_is_deterministic() {
        let id = EventId::new(ThreadId(2), 3);
        assert_eq!(id.heap_address(), id.heap_address());
        assert_eq!(id.heap_address().0, HEAP_BASE + (2 << 28) + (3 << 16));
        assert_ne!(id.heap_address(), EventId::new(ThreadId(1), 3).heap_address());
    }

    #[test]
    fn test_rmw_ops() {
        assert_eq!(RmwOp::Sub(1).apply(0), Some(u64::MAX));
        assert_eq!(RmwOp::Exchange(9).apply(4), Some(9));
        assert_eq!(RmwOp::CompareExchange { expected: 4, new: 5 }.apply(4), Some(5));
        assert_eq!(RmwOp::Max(3).apply(7), Some(7));
        assert_eq!(RmwOp::Min(3).apply(7), Some(3));
        assert_eq!(RmwOp::Or(0b01).apply(0b10), Some(0b11));
    }

    #[test]
    fn test_orders() {
        assert!(!MemoryOrder::Plain.is_atomic());
        assert!(MemoryOrder::SeqCst.is_acquire() && MemoryOrder::SeqCst.is_release());
        assert!(!MemoryOrder::Release.is_acquire());
        assert!(FenceKind::SynchronizeRcu.is_full());
        assert!(!FenceKind::RcuReadLock.is_release());
    }

    #[test]
    fn test_overlap_and_alignment() {
        let a = Location::new(Address(0x100), 8);
        let b = Location::new(Address(0x104), 4);
        let c = Location::new(Address(0x108), 8);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(Address(0x104).is_aligned(4));
        assert!(!Address(0x104).is_aligned(8));
    }
}
