//! Event labels: the closed set of event kinds.

use super::types::{Address, BlockReason, EventId, FenceKind, Location, MemoryOrder, RmwOp, ThreadId, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an `Assume` came from user code or from a summarised spin loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumeKind {
    /// Written by the program author
    User,
    /// Produced by spin-loop summarisation
    Spinloop,
}

/// Annotation events carry facts about the program rather than accesses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// Blocks the thread when `holds` is false
    Assume {
        /// Evaluated condition
        holds: bool,
        /// Origin of the assumption
        kind: AssumeKind,
    },
    /// Assertion; `holds == false` is a violation
    Assert {
        /// Evaluated condition
        holds: bool,
        /// Message reported on failure
        message: String,
    },
    /// The next `ThreadCreate` spawns a mirror of the given thread
    SpawnSymmetric(ThreadId),
    /// The next RMW is helped by a `HelpingCas` with the same key
    HelpedCas(u32),
    /// The next RMW helps a `HelpedCas` with the same key
    HelpingCas(u32),
    /// Persistency barrier
    PersistencyBarrier,
    /// Marks the start of a recovery routine
    RecoveryRoutine,
    /// The next write must stay coherence-maximal
    FinalWrite,
}

/// What happened at an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLabel {
    /// Load
    Read {
        /// Target
        loc: Location,
        /// Memory order
        order: MemoryOrder,
    },
    /// Store
    Write {
        /// Target
        loc: Location,
        /// Stored value
        value: Value,
        /// Memory order
        order: MemoryOrder,
    },
    /// Atomic read-modify-write
    ReadModifyWrite {
        /// Target
        loc: Location,
        /// Operation applied to the value read
        op: RmwOp,
        /// Memory order
        order: MemoryOrder,
    },
    /// Fence or RCU primitive
    Fence(FenceKind),
    /// Spawns a thread running `entry(arg)`
    ThreadCreate {
        /// Entry point understood by the source
        entry: usize,
        /// Argument
        arg: Value,
    },
    /// Waits for `thread` to finish
    ThreadJoin {
        /// Joined thread
        thread: ThreadId,
    },
    /// Mutex acquisition
    LockAcquire {
        /// Lock word
        addr: Address,
    },
    /// Mutex release
    LockRelease {
        /// Lock word
        addr: Address,
    },
    /// Heap allocation
    Malloc {
        /// Bytes
        size: u64,
    },
    /// Heap deallocation
    Free {
        /// Block start
        addr: Address,
    },
    /// Annotation
    Annotation(Annotation),
    /// First event of every thread; links to the creating event
    ThreadStart {
        /// Creating `ThreadCreate`, `None` for initial threads
        parent: Option<EventId>,
    },
    /// Appended when the source reports `Done`
    ThreadFinish,
    /// The thread cannot progress on this branch
    Block(BlockReason),
}

impl EventLabel {
    /// Labels only the core may create
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::ThreadStart { .. } | Self::ThreadFinish | Self::Block(_))
    }

    /// Memory location touched by the event, lock words included
    pub const fn location(&self) -> Option<Location> {
        match self {
            Self::Read { loc, .. } | Self::Write { loc, .. } | Self::ReadModifyWrite { loc, .. } => {
                Some(*loc)
            }
            Self::LockAcquire { addr } | Self::LockRelease { addr } => Some(Location::lock(*addr)),
            _ => None,
        }
    }

    /// Memory order of the access, with locks as acquire/release
    pub const fn order(&self) -> Option<MemoryOrder> {
        match self {
            Self::Read { order, .. } | Self::Write { order, .. } | Self::ReadModifyWrite { order, .. } => {
                Some(*order)
            }
            Self::LockAcquire { .. } => Some(MemoryOrder::Acquire),
            Self::LockRelease { .. } => Some(MemoryOrder::Release),
            _ => None,
        }
    }

    /// RMW operation; a lock acquisition is a CAS from 0 to 1
    pub const fn rmw_op(&self) -> Option<RmwOp> {
        match self {
            Self::ReadModifyWrite { op, .. } => Some(*op),
            Self::LockAcquire { .. } => Some(RmwOp::CompareExchange { expected: 0, new: 1 }),
            _ => None,
        }
    }

    /// The annotation carried, if any
    pub const fn annotation(&self) -> Option<&Annotation> {
        match self {
            Self::Annotation(a) => Some(a),
            _ => None,
        }
    }

    /// Whether two labels describe the same action.
    ///
    /// `ThreadStart` parents are ignored so that mirrored threads compare
    /// equal.
    pub fn mirrors(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ThreadStart { .. }, Self::ThreadStart { .. }) => true,
            _ => self == other,
        }
    }

    /// Short kind name used in reports
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::ReadModifyWrite { .. } => "rmw",
            Self::Fence(_) => "fence",
            Self::ThreadCreate { .. } => "create",
            Self::ThreadJoin { .. } => "join",
            Self::LockAcquire { .. } => "lock",
            Self::LockRelease { .. } => "unlock",
            Self::Malloc { .. } => "malloc",
            Self::Free { .. } => "free",
            Self::Annotation(_) => "annotation",
            Self::ThreadStart { .. } => "start",
            Self::ThreadFinish => "finish",
            Self::Block(_) => "block",
        }
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { loc, order } => write!(f, "R{order:?}({})", loc.addr),
            Self::Write { loc, value, order } => write!(f, "W{order:?}({}, {value})", loc.addr),
            Self::ReadModifyWrite { loc, op, order } => write!(f, "U{order:?}({}, {op:?})", loc.addr),
            Self::Fence(kind) => write!(f, "F({kind:?})"),
            Self::ThreadCreate { entry, arg } => write!(f, "create({entry}, {arg})"),
            Self::ThreadJoin { thread } => write!(f, "join({thread})"),
            Self::LockAcquire { addr } => write!(f, "lock({addr})"),
            Self::LockRelease { addr } => write!(f, "unlock({addr})"),
            Self::Malloc { size } => write!(f, "malloc({size})"),
            Self::Free { addr } => write!(f, "free({addr})"),
            Self::Annotation(a) => write!(f, "{a:?}"),
            Self::ThreadStart { .. } => write!(f, "start"),
            Self::ThreadFinish => write!(f, "finish"),
            Self::Block(reason) => write!(f, "block({reason:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_cas_on_lock_word() {
        let lock = EventLabel::LockAcquire { addr: Address(0x40) };
        assert_eq!(lock.location(), Some(Location::lock(Address(0x40))));
        assert_eq!(lock.order(), Some(MemoryOrder::Acquire));
        assert_eq!(lock.rmw_op().and_then(|op| op.apply(0)), Some(1));
        assert_eq!(lock.rmw_op().and_then(|op| op.apply(1)), None);
    }

    #[test]
    fn test_starts_mirror_regardless_of_parent() {
        let a = EventLabel::ThreadStart { parent: None };
        let b = EventLabel::ThreadStart { parent: Some(EventId::new(ThreadId(0), 1)) };
        assert!(a.mirrors(&b));
        assert!(!EventLabel::ThreadFinish.mirrors(&a));
    }
}
