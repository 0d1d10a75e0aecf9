//! Violations, statistics and run reports

use crate::domain::event::{EventId, ThreadId};
use crate::domain::graph::ExecutionGraph;
use crate::domain::oracle::{DataRace, DurableState, Inconsistency, MemoryModel, UndefinedAccess};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Violations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A bug found in the program under test
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// `assert` failed
    #[error("assertion failed at {event}: {message}")]
    AssertionViolation {
        /// Failed assertion
        event: EventId,
        /// Its message
        message: String,
    },

    /// Conflicting accesses unordered by happens-before
    #[error("data race: {0}")]
    DataRace(DataRace),

    /// Invalid memory operation
    #[error("undefined behaviour: {} at {} on {}", .0.kind, .0.event, .0.addr)]
    UndefinedAccess(UndefinedAccess),

    /// Threads waiting on each other forever
    #[error("deadlock among threads {threads:?}")]
    Deadlock {
        /// Threads involved
        threads: Vec<ThreadId>,
    },

    /// A spin loop that no write can ever release
    #[error("liveness violation: {thread} spins forever")]
    Liveness {
        /// Spinning thread
        thread: ThreadId,
    },

    /// A thread hit the event bound without terminating
    #[error("{thread} does not terminate within the event bound")]
    Nontermination {
        /// Thread that hit the bound
        thread: ThreadId,
    },

    /// The recovery routine failed after a crash
    #[error("recovery failed after crash: {cause}")]
    PersistencyViolation {
        /// Memory that survived the crash
        state: DurableState,
        /// What the recovery routine hit
        cause: Box<Violation>,
    },
}

impl Violation {
    /// Process exit code for this violation
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::AssertionViolation { .. } => 10,
            Self::DataRace(_) => 11,
            Self::UndefinedAccess(_) => 12,
            Self::Deadlock { .. } => 13,
            Self::Liveness { .. } | Self::Nontermination { .. } => 14,
            Self::PersistencyViolation { .. } => 15,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fatal errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors that abort a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplorerError {
    /// The source answered differently for the same history
    #[error("event source is not deterministic: replay diverged at {event}")]
    NonDeterministicSource {
        /// First event whose replay differs
        event: EventId,
    },

    /// A complete execution failed the consistency re-check
    #[error("complete execution at {event} rejected on re-check: {reason}")]
    RejectedOnRecheck {
        /// Newest event of the execution
        event: EventId,
        /// What the oracle found
        reason: Inconsistency,
    },

    /// The source asked for something impossible
    #[error("invalid program: {0}")]
    InvalidProgram(String),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Statistics and report
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counters collected during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationStats {
    /// Complete executions
    pub executions: u64,
    /// Branches ending in a spurious block
    pub blocked: u64,
    /// Branches pruned by the oracle
    pub inconsistent: u64,
    /// Alternative reads-from or coherence choices resumed
    pub forward_revisits: u64,
    /// Backward revisits performed
    pub backward_revisits: u64,
    /// Largest graph seen
    pub max_graph_events: usize,
}

/// Bound that stopped a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    /// `max_executions`
    Executions,
    /// `timeout`
    Timeout,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationReport {
    /// Model checked
    pub model: MemoryModel,
    /// Counters
    pub stats: ExplorationStats,
    /// Violations, in discovery order
    pub violations: Vec<Violation>,
    /// Set when a bound cut the run short
    pub bound_reached: Option<BoundKind>,
    /// Wall-clock time
    pub elapsed: Duration,
}

impl ExplorationReport {
    pub(crate) fn new(model: MemoryModel) -> Self {
        Self {
            model,
            stats: ExplorationStats::default(),
            violations: Vec::new(),
            bound_reached: None,
            elapsed: Duration::ZERO,
        }
    }

    /// No violation was found
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Exit code of the first violation, 0 when clean
    pub fn exit_code(&self) -> i32 {
        self.violations.first().map_or(0, Violation::exit_code)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hooks called while exploring
pub trait ExecutionObserver {
    /// A consistent execution in which every thread finished
    fn on_complete(&mut self, _graph: &ExecutionGraph) {}

    /// A violation, with the graph exhibiting it
    fn on_violation(&mut self, _violation: &Violation, _graph: &ExecutionGraph) {}

    /// A crash point about to be recovered from
    fn on_recovery(&mut self, _state: &DurableState) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ExecutionObserver for NullObserver {}
