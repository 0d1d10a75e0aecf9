//! Adapters Layer - Ports & Adapters Pattern
//!
//! Connects the domain to its callers. The [`Checker`] takes a test
//! program, applies the program-level reductions, and drives the explorer.

pub mod checker;

pub use checker::{CheckError, CheckOutcome, Checker};
