//! Reduction Modules
//!
//! Each reduction removes branches the plain search would explore without
//! learning anything new:
//!
//! - [`symmetry`]: mirrored threads explore one representative order
//! - [`lapor`]: critical sections are ordered only when something forces it
//! - [`spinloop`]: busy-wait loops collapse to their final iteration

pub mod lapor;
pub mod spinloop;
pub mod symmetry;

pub use lapor::CriticalSection;
pub use spinloop::{summarize_spinloops, LoopSite, RejectReason, SpinloopReport};
