//! Domain Layer - Graph-based Model Checking
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Event Module                  Graph Module                 │
//! │  ├─ EventLabel                 ├─ ExecutionGraph (po/rf/co) │
//! │  ├─ EventId / ThreadId         ├─ UndoLog                   │
//! │  └─ Annotation                 └─ VectorClock (porf views)  │
//! │                                                             │
//! │  Oracle Module                 Reduction Module             │
//! │  ├─ SC / TSO / RA / LKMM       ├─ symmetry                  │
//! │  ├─ races, undefined access    ├─ lapor (lock-aware)        │
//! │  └─ persistency crash points   └─ spinloop                  │
//! │                                                             │
//! │                   Explorer Module                           │
//! │                   ├─ Explorer (revisit-based search)        │
//! │                   └─ Worklist / saved states                │
//! │                                                             │
//! │  Source trait ◀──────────────── Program Module (JSON IR)    │
//! │                                 └─ Interpreter              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Ownership
//!
//! The explorer exclusively owns the graph it is extending. Forward
//! backtracking rewinds that graph through its undo log; backward revisits
//! push the whole search state and continue in a restricted copy. Nothing is
//! shared and nothing is locked.
//!
//! ```rust
//! use graphmc::domain::explorer::{Explorer, ExplorerConfig};
//! use graphmc::domain::oracle::MemoryModel;
//! use graphmc::domain::program::{Interpreter, Program};
//!
//! let program: Program = serde_json::from_str(r#"{
//!     "globals": [{"name": "x"}, {"name": "y"}],
//!     "functions": [
//!         {"name": "t0", "body": [
//!             {"op": "store", "addr": {"global": "x"}, "value": {"const": 1}},
//!             {"op": "load", "dst": 0, "addr": {"global": "y"}}
//!         ]},
//!         {"name": "t1", "body": [
//!             {"op": "store", "addr": {"global": "y"}, "value": {"const": 1}},
//!             {"op": "load", "dst": 0, "addr": {"global": "x"}}
//!         ]}
//!     ],
//!     "threads": [{"function": "t0"}, {"function": "t1"}]
//! }"#).unwrap();
//!
//! let source = Interpreter::new(&program).unwrap();
//! let config = ExplorerConfig::builder().with_model(MemoryModel::Sc).build();
//! let report = Explorer::new(&source, config).explore().unwrap();
//! assert_eq!(report.stats.executions, 3);
//! ```

pub mod event;
pub mod explorer;
pub mod graph;
pub mod oracle;
pub mod program;
pub mod reduction;
pub mod source;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-exports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub use event::{
    Address, Annotation, AssumeKind, BlockReason, EventId, EventLabel, FenceKind, Location, MemoryOrder,
    RmwOp, Stamp, ThreadId, Value,
};
pub use explorer::{
    BoundKind, ExecutionObserver, ExplorationReport, ExplorationStats, Explorer, ExplorerConfig,
    ExplorerError, NullObserver, StopPolicy, Violation,
};
pub use graph::{Event, ExecutionGraph, WriteRef};
pub use oracle::{DataRace, DurableState, Inconsistency, MemoryModel, Oracle, UndefinedAccess};
pub use program::{Interpreter, Program, ProgramError};
pub use source::{EventSource, Next, ThreadContext, ThreadSpec};
