//! Run lifecycle orchestration.
//!
//! The orchestrator drives runs through the stage machine:
//! - **SEQUENCING**: nothing to do, re-polled next invocation
//! - **TO_START**: demultiplexing is launched
//! - **IN_PROGRESS**: progress check, which may complete the run
//! - **COMPLETED**: undetermined indices, QC, status upload, then transfer
//!   unless the transfer ledger already holds the run

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::RunOrchestrator;
pub use types::{BatchSummary, OrchestratorError, RunOutcome, RunSummary};
