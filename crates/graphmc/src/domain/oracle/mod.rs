//! Consistency Oracle
//!
//! Decides whether an execution graph is allowed by a memory model and
//! detects data races, undefined memory behaviour and persistency crash
//! points.
//!
//! # Models
//!
//! | Model | Condition |
//! |-------|-----------|
//! | `Sc`  | acyclic(po ∪ rf ∪ co ∪ fr) |
//! | `Tso` | per-location SC and acyclic(ppo ∪ rfe ∪ co ∪ fr) |
//! | `Ra`  | hb-coherence and a seq_cst order |
//! | `Lkmm`| `Ra` plus the RCU grace-period rule |
//!
//! Every model also requires porf acyclicity, RMW atomicity, final-write
//! maximality and intact helped-CAS merges.

pub mod common;
pub mod cycle;
pub mod hb;
pub mod lkmm;
pub mod persistency;
pub mod race;
pub mod sc;
pub mod tso;
pub mod undefined;
pub mod weak;

pub use hb::{HappensBefore, Synchronization};
pub use persistency::DurableState;
pub use race::DataRace;
pub use undefined::{UndefinedAccess, UndefinedKind};

use crate::domain::event::{Address, EventId};
use crate::domain::graph::ExecutionGraph;
use crate::domain::reduction::lapor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported memory models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryModel {
    /// Sequential consistency
    Sc,
    /// Total store order (x86)
    Tso,
    /// Release/acquire weak memory
    #[default]
    Ra,
    /// Linux-kernel style: RA plus locks and RCU
    Lkmm,
}

impl MemoryModel {
    /// Which accesses synchronise under this model
    pub const fn synchronization(self) -> Synchronization {
        match self {
            Self::Sc | Self::Tso => Synchronization::AllAtomics,
            Self::Ra | Self::Lkmm => Synchronization::ReleaseAcquire,
        }
    }
}

impl fmt::Display for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sc => "sc",
            Self::Tso => "tso",
            Self::Ra => "ra",
            Self::Lkmm => "lkmm",
        })
    }
}

/// Unknown model name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown memory model `{0}` (expected sc, tso, ra or lkmm)")]
pub struct UnknownModel(pub String);

impl FromStr for MemoryModel {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sc" => Ok(Self::Sc),
            "tso" => Ok(Self::Tso),
            "ra" | "rc11" => Ok(Self::Ra),
            "lkmm" => Ok(Self::Lkmm),
            _ => Err(UnknownModel(s.to_string())),
        }
    }
}

/// Why a graph is inconsistent. Never surfaced to users; the branch is
/// pruned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Inconsistency {
    /// (po ∪ rf)⁺ has a cycle
    #[error("porf cycle")]
    PorfCycle,
    /// hb has a cycle
    #[error("happens-before cycle")]
    HbCycle,
    /// RMW not adjacent to its source in coherence
    #[error("atomicity violated at {0}")]
    Atomicity(EventId),
    /// Final write overtaken in coherence
    #[error("final write {0} is not coherence-maximal")]
    FinalWrite(EventId),
    /// Merged helped CAS lost its partner
    #[error("helped CAS {0} no longer matches its partner")]
    HelpedCas(EventId),
    /// Coherence contradicts hb or program order
    #[error("coherence violated")]
    Coherence,
    /// No total order over seq_cst events
    #[error("seq_cst order is cyclic")]
    SeqCst,
    /// SC acyclicity failed
    #[error("sequential consistency violated")]
    SequentialConsistency,
    /// TSO acyclicity failed
    #[error("total store order violated")]
    TotalStoreOrder,
    /// RCU grace-period rule broken around the given grace period
    #[error("grace period {0} violated")]
    Rcu(EventId),
    /// Critical sections on a lock cannot be ordered
    #[error("critical sections on {0} cannot be ordered")]
    LockOrder(Address),
}

/// Relations computed by a successful check, reused by the predicates
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Happens-before
    pub hb: HappensBefore,
    /// Derived critical-section order (lock-aware mode)
    pub lock_edges: Vec<(EventId, EventId)>,
}

/// Consistency oracle for one memory model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oracle {
    model: MemoryModel,
}

impl Oracle {
    /// Oracle for `model`
    pub const fn new(model: MemoryModel) -> Self {
        Self { model }
    }

    /// The model checked
    pub const fn model(&self) -> MemoryModel {
        self.model
    }

    /// Decide consistency of `graph`
    pub fn check(&self, graph: &ExecutionGraph) -> Result<Analysis, Inconsistency> {
        if graph.porf_views().is_none() {
            return Err(Inconsistency::PorfCycle);
        }
        common::check_atomicity(graph)?;
        common::check_final_writes(graph)?;
        common::check_helped(graph)?;

        let sync = self.model.synchronization();
        let lock_edges = if graph.is_lock_aware() {
            lapor::lock_edges(graph, sync)?
        } else {
            Vec::new()
        };
        let hb = HappensBefore::compute(graph, sync, &lock_edges)?;
        match self.model {
            MemoryModel::Sc => sc::check(graph, &lock_edges)?,
            MemoryModel::Tso => tso::check(graph, &lock_edges)?,
            MemoryModel::Ra => weak::check(graph, &hb)?,
            MemoryModel::Lkmm => {
                weak::check(graph, &hb)?;
                lkmm::check_rcu(graph, &hb)?;
            }
        }
        Ok(Analysis { hb, lock_edges })
    }

    /// Whether `graph` is consistent
    pub fn is_consistent(&self, graph: &ExecutionGraph) -> bool {
        self.check(graph).is_ok()
    }

    /// First data race of a consistent graph
    pub fn race(&self, graph: &ExecutionGraph, analysis: &Analysis) -> Option<DataRace> {
        race::find_race(graph, &analysis.hb)
    }

    /// First undefined access of a consistent graph
    pub fn undefined(&self, graph: &ExecutionGraph, analysis: &Analysis) -> Option<UndefinedAccess> {
        undefined::find_undefined(graph, &analysis.hb)
    }

    /// Crash points of a complete graph
    pub fn durable_states(&self, graph: &ExecutionGraph, analysis: &Analysis) -> Vec<DurableState> {
        persistency::durable_states(graph, &analysis.hb)
    }
}
