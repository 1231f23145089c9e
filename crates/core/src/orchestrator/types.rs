//! Types for the run orchestrator.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::run::{RunError, TransferReport};

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A discovered run could not be classified. Fatal in batch mode.
    #[error("unsupported instrument for run {}", path.display())]
    UnsupportedInstrument { path: PathBuf },

    /// Transfer or QC ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Run handle error.
    #[error("run error: {0}")]
    Run(#[from] RunError),

    /// Status database operation requested without a configured database.
    #[error("status database is not configured")]
    StatusDbDisabled,
}

impl OrchestratorError {
    /// Whether the next invocation may get past this without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Ledger(_) => true,
            Self::Run(e) => e.is_transient(),
            Self::UnsupportedInstrument { .. } | Self::StatusDbDisabled => false,
        }
    }
}

/// What one pass over a run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Instrument still writing; nothing done.
    Sequencing,
    /// Demultiplexing launched.
    DemultiplexStarted,
    /// Demultiplexing still running.
    InProgress,
    /// Transfer dispatched and recorded in the ledger.
    Transferred { report: TransferReport },
    /// QC failed and transfer is not forced.
    TransferDeferred,
    /// Run already in the transfer ledger.
    AlreadyTransferred,
    /// Undetermined index computation failed; retried next invocation.
    Halted,
    /// No handle for the run's instrument family.
    Skipped,
    /// A collaborator error stopped this run.
    Failed { error: String },
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequencing => "sequencing",
            Self::DemultiplexStarted => "demultiplex_started",
            Self::InProgress => "in_progress",
            Self::Transferred { .. } => "transferred",
            Self::TransferDeferred => "transfer_deferred",
            Self::AlreadyTransferred => "already_transferred",
            Self::Halted => "halted",
            Self::Skipped => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Outcome of one run within a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Per-run outcomes of a batch invocation, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub runs: Vec<RunSummary>,
}

impl BatchSummary {
    pub fn push(&mut self, run_id: impl Into<String>, path: impl Into<PathBuf>, outcome: RunOutcome) {
        self.runs.push(RunSummary {
            run_id: run_id.into(),
            path: path.into(),
            outcome,
        });
    }

    pub fn count(&self, name: &str) -> usize {
        self.runs.iter().filter(|r| r.outcome.as_str() == name).count()
    }

    pub fn transferred(&self) -> usize {
        self.count("transferred")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn outcome(&self, run_id: &str) -> Option<&RunOutcome> {
        self.runs.iter().find(|r| r.run_id == run_id).map(|r| &r.outcome)
    }
}
