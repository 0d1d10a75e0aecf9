//! Execution Graphs
//!
//! The explorer's single mutable data structure. A graph holds the committed
//! events of every thread together with reads-from and per-location
//! coherence. Mutations are recorded on an undo log so the explorer can
//! truncate back to any stamp when it resumes a forward revisit.
//!
//! # Relations
//!
//! - **po**: per thread, by index
//! - **rf**: stored on each read-like event
//! - **co**: per address, a list of placed writes (`Init` implicit first)
//! - **porf**: (po ∪ rf ∪ create ∪ join)⁺, as memoised vector clocks

pub mod execution;
pub mod layout;
pub mod undo;
pub mod vector_clock;

pub use execution::{Event, ExecutionGraph, Views, WriteRef};
pub use layout::{Global, MemoryLayout, Placement};
pub use undo::{UndoEntry, UndoLog};
pub use vector_clock::VectorClock;
