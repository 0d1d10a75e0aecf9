//! graphmc - Stateless Model Checking over Execution Graphs
//!
//! # Overview
//!
//! `graphmc` explores every consistent execution graph of a concurrent
//! program under a weak memory model, each exactly once, and reports
//! assertion failures, data races, undefined memory behaviour, deadlocks,
//! liveness violations and persistency bugs.
//!
//! # Layered Architecture
//!
//! - **Domain**: events, graphs, the consistency oracle, the explorer and
//!   its reductions
//! - **Infrastructure**: loading JSON test programs
//! - **Adapters**: the [`Checker`] façade used by the command line
//!
//! # Memory Models
//!
//! - `sc`: sequential consistency
//! - `tso`: total store order
//! - `ra`: release/acquire weak memory (default)
//! - `lkmm`: RA with locks, full fences and RCU
//!
//! # Usage
//!
//! ```rust
//! use graphmc::{parse_program, Checker, ExplorerConfig, MemoryModel};
//!
//! let program = parse_program(r#"{
//!     "globals": [{"name": "x"}],
//!     "functions": [{"name": "inc", "body": [
//!         {"op": "rmw", "dst": 0, "addr": {"global": "x"}, "operation": {"add": {"const": 1}}}
//!     ]}],
//!     "threads": [{"function": "inc"}, {"function": "inc"}]
//! }"#).unwrap();
//!
//! let config = ExplorerConfig::builder().with_model(MemoryModel::Sc).build();
//! let outcome = Checker::new(config).check(&program).unwrap();
//! assert_eq!(outcome.report.stats.executions, 2);
//! assert_eq!(outcome.exit_code(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Layers
pub mod adapters;
pub mod domain;
pub mod infrastructure;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Events and graphs
pub use domain::{EventId, EventLabel, ExecutionGraph, ThreadId, WriteRef};

// Exploration
pub use domain::{
    EventSource, ExecutionObserver, ExplorationReport, Explorer, ExplorerConfig, ExplorerError,
    MemoryModel, StopPolicy, Violation,
};

// Front end
pub use adapters::{CheckError, CheckOutcome, Checker};
pub use domain::{Interpreter, Program};
pub use infrastructure::{load_program, parse_program, LoadError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
