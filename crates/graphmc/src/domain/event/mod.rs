//! Event Model
//!
//! An execution is a set of events, one per visible action of a thread.
//! Events are identified by `(thread, index)`; their kind is a closed
//! [`EventLabel`] variant. The explorer adds three core-owned labels that no
//! source ever produces: `ThreadStart`, `ThreadFinish` and `Block`.

pub mod label;
pub mod types;

pub use label::{Annotation, AssumeKind, EventLabel};
pub use types::{
    Address, BlockReason, EventId, FenceKind, Location, MemoryOrder, RmwOp, Stamp, ThreadId, Value,
    HEAP_BASE,
};
