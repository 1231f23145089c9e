//! Trait definitions for run handles.

use std::path::Path;

use super::error::RunError;
use super::types::{QcReport, RunId, RunRecord, RunStatus, TransferReport};
use crate::sequencer::SequencerType;

/// Capability set of one run directory, implemented once per instrument family.
///
/// Implementations derive every answer from the filesystem; none of them
/// caches a stage between calls. Actions whose output already exists on disk
/// must be no-ops.
pub trait RunHandle: Send + Sync {
    fn run_id(&self) -> &RunId;

    fn path(&self) -> &Path;

    fn sequencer_type(&self) -> SequencerType;

    /// Current stage, recomputed from on-disk markers.
    fn run_status(&self) -> Result<RunStatus, RunError>;

    /// Starts demultiplexing. Returns once the work is launched.
    fn demultiplex(&self) -> Result<(), RunError>;

    /// Progress check for a run in progress. May complete the run, e.g. by
    /// aggregating finished partial outputs.
    fn check_run_status(&self) -> Result<(), RunError>;

    /// Computes undetermined indices for lanes without sample indices.
    /// `Ok(false)` means the computation failed and the run must wait.
    fn compute_undetermined(&self) -> Result<bool, RunError>;

    /// Evaluates QC metrics against the family thresholds.
    fn evaluate_qc(&self) -> Result<QcReport, RunError>;

    /// Document for the status database.
    fn run_record(&self) -> Result<RunRecord, RunError>;

    /// Copies the run to the analysis server, then moves it under
    /// `archive_root` when given.
    ///
    /// `Ok` means the copy was dispatched, whatever its outcome.
    fn transfer(
        &self,
        archive_root: Option<&Path>,
        start_analysis: bool,
    ) -> Result<TransferReport, RunError>;
}

/// Builds run handles for classified runs.
pub trait RunFactory: Send + Sync {
    /// `None` when the family has no implementation yet.
    fn build(&self, sequencer: SequencerType, run_dir: &Path) -> Option<Box<dyn RunHandle>>;
}
