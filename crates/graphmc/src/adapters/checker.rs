//! Checker: from a test program to a report
//!
//! Wires the front end to the explorer: summarise spin loops, build the
//! interpreter, explore.

use crate::domain::explorer::{
    ExecutionObserver, ExplorationReport, Explorer, ExplorerConfig, ExplorerError, NullObserver,
};
use crate::domain::program::{Interpreter, Program, ProgramError};
use crate::domain::reduction::{summarize_spinloops, SpinloopReport};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;
use tracing::info;

/// Why a check could not run
#[derive(Debug, Error)]
pub enum CheckError {
    /// The program is malformed
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// The run was aborted
    #[error(transparent)]
    Explorer(#[from] ExplorerError),
}

/// Everything a check produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Program name
    pub program: String,
    /// Effective configuration
    pub config: ExplorerConfig,
    /// Spin-loop summarisation result (empty when disabled)
    pub spinloops: SpinloopReport,
    /// Exploration result
    pub report: ExplorationReport,
}

impl CheckOutcome {
    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }
}

/// Runs the explorer over test programs
#[derive(Debug, Clone, Copy, Default)]
pub struct Checker {
    config: ExplorerConfig,
}

impl Checker {
    /// Checker with `config`
    pub const fn new(config: ExplorerConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    pub const fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Check `program`
    pub fn check(&self, program: &Program) -> Result<CheckOutcome, CheckError> {
        self.check_with(program, &mut NullObserver)
    }

    /// Check `program`, reporting each execution to `observer`
    pub fn check_with(
        &self,
        program: &Program,
        observer: &mut dyn ExecutionObserver,
    ) -> Result<CheckOutcome, CheckError> {
        let (program, spinloops): (Cow<'_, Program>, SpinloopReport) = if self.config.reductions.spinloops {
            let (summarized, report) = summarize_spinloops(program);
            (Cow::Owned(summarized), report)
        } else {
            (Cow::Borrowed(program), SpinloopReport::default())
        };
        let interpreter = Interpreter::new(&program)?;
        info!(
            program = %program.name,
            model = %self.config.model,
            summarized = spinloops.summarized.len(),
            "checking"
        );
        let report = Explorer::new(&interpreter, self.config).run(observer)?;
        Ok(CheckOutcome {
            program: program.name.clone(),
            config: self.config,
            spinloops,
            report,
        })
    }
}
