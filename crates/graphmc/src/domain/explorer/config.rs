//! Explorer configuration

use crate::domain::oracle::MemoryModel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do after the first violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Stop the whole run
    #[default]
    FirstViolation,
    /// Keep exploring and collect every violation
    Exhaustive,
}

/// Reductions switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reductions {
    /// Symmetry reduction for mirrored threads
    pub symmetry: bool,
    /// Lock-aware partial-order reduction
    pub lock_aware: bool,
    /// Spin-loop summarisation of the program
    pub spinloops: bool,
}

impl Default for Reductions {
    fn default() -> Self {
        Self { symmetry: false, lock_aware: false, spinloops: true }
    }
}

/// Limits on the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Stop after this many complete executions
    pub max_executions: Option<u64>,
    /// Stop after this much wall-clock time
    pub timeout: Option<Duration>,
    /// Block a thread once it has this many events
    pub max_thread_events: Option<usize>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self { max_executions: None, timeout: None, max_thread_events: Some(256) }
    }
}

/// Everything the explorer needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Memory model
    pub model: MemoryModel,
    /// Reductions
    pub reductions: Reductions,
    /// Bounds
    pub bounds: Bounds,
    /// Report granularity
    pub stop_policy: StopPolicy,
    /// Report spin loops and bound hits that can never make progress
    pub check_liveness: bool,
    /// Enumerate crash points and run the recovery routine
    pub persistency: bool,
    /// Re-query the source after each backward revisit
    pub check_determinism: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            model: MemoryModel::default(),
            reductions: Reductions::default(),
            bounds: Bounds::default(),
            stop_policy: StopPolicy::default(),
            check_liveness: false,
            persistency: false,
            check_determinism: true,
        }
    }
}

impl ExplorerConfig {
    /// Start from the defaults
    pub fn builder() -> ExplorerConfigBuilder {
        ExplorerConfigBuilder::new()
    }
}

/// Builder for [`ExplorerConfig`]
///
/// ```rust
/// use graphmc::domain::explorer::{ExplorerConfig, StopPolicy};
/// use graphmc::domain::oracle::MemoryModel;
///
/// let config = ExplorerConfig::builder()
///     .with_model(MemoryModel::Sc)
///     .with_symmetry(true)
///     .with_stop_policy(StopPolicy::Exhaustive)
///     .build();
/// assert!(config.reductions.symmetry);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExplorerConfigBuilder {
    config: ExplorerConfig,
}

impl ExplorerConfigBuilder {
    /// Builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory model
    #[must_use]
    pub const fn with_model(mut self, model: MemoryModel) -> Self {
        self.config.model = model;
        self
    }

    /// Symmetry reduction
    #[must_use]
    pub const fn with_symmetry(mut self, on: bool) -> Self {
        self.config.reductions.symmetry = on;
        self
    }

    /// Lock-aware reduction
    #[must_use]
    pub const fn with_lock_aware(mut self, on: bool) -> Self {
        self.config.reductions.lock_aware = on;
        self
    }

    /// Spin-loop summarisation
    #[must_use]
    pub const fn with_spinloops(mut self, on: bool) -> Self {
        self.config.reductions.spinloops = on;
        self
    }

    /// Execution bound
    #[must_use]
    pub const fn with_max_executions(mut self, max: Option<u64>) -> Self {
        self.config.bounds.max_executions = max;
        self
    }

    /// Wall-clock bound
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.bounds.timeout = timeout;
        self
    }

    /// Per-thread event bound
    #[must_use]
    pub const fn with_max_thread_events(mut self, max: Option<usize>) -> Self {
        self.config.bounds.max_thread_events = max;
        self
    }

    /// Report granularity
    #[must_use]
    pub const fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.config.stop_policy = policy;
        self
    }

    /// Liveness checking
    #[must_use]
    pub const fn with_liveness(mut self, on: bool) -> Self {
        self.config.check_liveness = on;
        self
    }

    /// Persistency checking
    #[must_use]
    pub const fn with_persistency(mut self, on: bool) -> Self {
        self.config.persistency = on;
        self
    }

    /// Replay determinism guard
    #[must_use]
    pub const fn with_determinism_check(mut self, on: bool) -> Self {
        self.config.check_determinism = on;
        self
    }

    /// Finish
    pub const fn build(self) -> ExplorerConfig {
        self.config
    }
}
