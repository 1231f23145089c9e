//! Run orchestrator implementation.
//!
//! Each pass recomputes a run's stage from disk, performs the action for that
//! stage and then, unconditionally, checks whether the run is completed and
//! not yet transferred. A run whose demultiplexing finishes during the pass
//! therefore reaches the transfer decision in the same invocation.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::discovery::RunDiscovery;
use crate::ledger::{QcLedger, TransferLedger};
use crate::notify::Notifier;
use crate::run::{QcReport, RunFactory, RunHandle, RunStatus};
use crate::sequencer::{resolve_sequencer_type, SequencerType};
use crate::statusdb::{StatusDbSync, UploadOutcome};

use super::config::OrchestratorConfig;
use super::types::{BatchSummary, OrchestratorError, RunOutcome};

/// Drives runs through demultiplexing, QC, status upload and transfer.
///
/// Owns both ledgers. Run handles never read or write them.
pub struct RunOrchestrator {
    config: OrchestratorConfig,
    factory: Arc<dyn RunFactory>,
    notifier: Arc<dyn Notifier>,
    statusdb: Option<StatusDbSync>,
    transfer_ledger: TransferLedger,
    qc_ledger: QcLedger,
}

impl RunOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        factory: Arc<dyn RunFactory>,
        notifier: Arc<dyn Notifier>,
        statusdb: Option<StatusDbSync>,
    ) -> Self {
        let transfer_ledger = TransferLedger::new(&config.transfer_ledger);
        let qc_ledger = QcLedger::new(&config.qc_ledger);
        Self {
            config,
            factory,
            notifier,
            statusdb,
            transfer_ledger,
            qc_ledger,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn transfer_ledger(&self) -> &TransferLedger {
        &self.transfer_ledger
    }

    pub fn qc_ledger(&self) -> &QcLedger {
        &self.qc_ledger
    }

    /// Processes every run found under the data roots.
    ///
    /// A run that cannot be classified aborts the batch. Any other per-run
    /// error is logged and recorded in the summary.
    pub fn run_batch(&self) -> Result<BatchSummary, OrchestratorError> {
        self.flush_pending_uploads();

        let mut summary = BatchSummary::default();
        for path in RunDiscovery::new(&self.config.data_dirs) {
            let sequencer = resolve_sequencer_type(&path);
            if sequencer == SequencerType::Unknown {
                error!(
                    "Run {} has an unsupported instrument, aborting batch",
                    path.display()
                );
                return Err(OrchestratorError::UnsupportedInstrument { path });
            }

            let outcome = self.process_path(sequencer, &path);
            summary.push(run_name(&path), &path, outcome);
        }

        info!(
            "Batch finished: {} runs, {} transferred, {} failed",
            summary.runs.len(),
            summary.transferred(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Processes one run. An unclassifiable run is skipped with a warning.
    pub fn run_single(&self, path: &Path) -> RunOutcome {
        self.flush_pending_uploads();

        let sequencer = resolve_sequencer_type(path);
        if sequencer == SequencerType::Unknown {
            warn!("Run {} has an unsupported instrument, skipping", path.display());
            return RunOutcome::Skipped;
        }
        self.process_path(sequencer, path)
    }

    fn process_path(&self, sequencer: SequencerType, path: &Path) -> RunOutcome {
        let Some(run) = self.factory.build(sequencer, path) else {
            return RunOutcome::Skipped;
        };

        match self.process_run(run.as_ref()) {
            Ok(outcome) => {
                debug!("Run {}: {}", run.run_id(), outcome.as_str());
                outcome
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("Run {} failed, retrying next invocation: {}", run.run_id(), e);
                } else {
                    error!("Run {} failed and needs attention: {}", run.run_id(), e);
                }
                RunOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// One pass of the stage machine over `run`.
    pub fn process_run(&self, run: &dyn RunHandle) -> Result<RunOutcome, OrchestratorError> {
        let id = run.run_id();

        let stage_action = match run.run_status()? {
            RunStatus::Sequencing => {
                info!("Run {} is still sequencing", id);
                Some(RunOutcome::Sequencing)
            }
            RunStatus::ToStart => {
                info!("Starting demultiplexing of run {}", id);
                run.demultiplex()?;
                Some(RunOutcome::DemultiplexStarted)
            }
            RunStatus::InProgress => {
                info!("Checking demultiplexing progress of run {}", id);
                run.check_run_status()?;
                Some(RunOutcome::InProgress)
            }
            RunStatus::Completed => None,
        };

        if let Some(outcome) = stage_action {
            if run.run_status()? != RunStatus::Completed {
                return Ok(outcome);
            }
        }

        if self.transfer_ledger.is_transferred(&id.id)? {
            info!("Run {} already transferred", id);
            return Ok(RunOutcome::AlreadyTransferred);
        }

        self.finish(run)
    }

    /// Post-demultiplexing steps for a completed run not in the ledger.
    fn finish(&self, run: &dyn RunHandle) -> Result<RunOutcome, OrchestratorError> {
        let id = run.run_id();

        if !run.compute_undetermined()? {
            error!(
                "Undetermined index computation failed for run {}, stopping here",
                id
            );
            return Ok(RunOutcome::Halted);
        }

        let qc = run.evaluate_qc()?;
        self.post_qc_report(&qc)?;
        self.upload_record(run, qc.passed);

        if !qc.passed && !self.config.force_transfer {
            warn!(
                "Run {} failed QC and transfer is not forced, deferring transfer",
                id
            );
            return Ok(RunOutcome::TransferDeferred);
        }
        if !qc.passed {
            warn!("Run {} failed QC, transferring anyway (force_transfer)", id);
        }

        self.dispatch_transfer(run, self.config.start_analysis)
    }

    /// Records a QC result when it differs from the last recorded one, and
    /// notifies on a newly recorded failure.
    fn post_qc_report(&self, qc: &QcReport) -> Result<(), OrchestratorError> {
        if self.qc_ledger.last_result(&qc.run_id)? == Some(qc.passed) {
            debug!("QC result for {} unchanged, not re-recorded", qc.run_id);
            return Ok(());
        }

        self.qc_ledger.record(qc)?;
        if qc.passed {
            info!("Run {} passed QC", qc.run_id);
            return Ok(());
        }

        warn!("Run {} failed QC", qc.run_id);
        if let Err(e) = self
            .notifier
            .notify_qc_failure(qc, self.config.log_file.as_deref())
        {
            warn!("Could not send QC failure notice for {}: {}", qc.run_id, e);
        }
        Ok(())
    }

    fn upload_record(&self, run: &dyn RunHandle, qc_passed: bool) -> Option<UploadOutcome> {
        let sync = self.statusdb.as_ref()?;
        match run.run_record() {
            Ok(mut record) => {
                record.qc_passed = Some(qc_passed);
                Some(sync.upload(&record))
            }
            Err(e) => {
                warn!("Could not build status record for run {}: {}", run.run_id(), e);
                None
            }
        }
    }

    fn dispatch_transfer(
        &self,
        run: &dyn RunHandle,
        start_analysis: bool,
    ) -> Result<RunOutcome, OrchestratorError> {
        let id = run.run_id();
        let archive_root = self.config.archive_dirs.for_sequencer(run.sequencer_type());

        let report = run.transfer(archive_root, start_analysis)?;
        if !report.success {
            warn!(
                "Transfer of run {} dispatched but failed; recording it anyway",
                id
            );
        }

        if !self.transfer_ledger.record_transferred(&id.id)? {
            warn!("Run {} was recorded as transferred by another process", id);
        }
        Ok(RunOutcome::Transferred { report })
    }

    /// Transfers one run regardless of stage and QC.
    ///
    /// A run already in the ledger is left alone unless `force` is set.
    pub fn transfer_single(
        &self,
        path: &Path,
        start_analysis: bool,
        force: bool,
    ) -> Result<RunOutcome, OrchestratorError> {
        let Some(run) = self.build(path)? else {
            return Ok(RunOutcome::Skipped);
        };

        if !force && self.transfer_ledger.is_transferred(&run.run_id().id)? {
            info!("Run {} already transferred", run.run_id());
            return Ok(RunOutcome::AlreadyTransferred);
        }
        self.dispatch_transfer(run.as_ref(), start_analysis)
    }

    /// Pushes one run's record to the status database.
    pub fn upload_single(&self, path: &Path) -> Result<UploadOutcome, OrchestratorError> {
        let sync = self
            .statusdb
            .as_ref()
            .ok_or(OrchestratorError::StatusDbDisabled)?;
        let Some(run) = self.build(path)? else {
            return Ok(UploadOutcome::Dropped);
        };

        let mut record = run.run_record()?;
        record.qc_passed = self.qc_ledger.last_result(&run.run_id().id)?;
        Ok(sync.upload(&record))
    }

    fn build(&self, path: &Path) -> Result<Option<Box<dyn RunHandle>>, OrchestratorError> {
        let sequencer = resolve_sequencer_type(path);
        if sequencer == SequencerType::Unknown {
            return Err(OrchestratorError::UnsupportedInstrument {
                path: path.to_path_buf(),
            });
        }
        Ok(self.factory.build(sequencer, path))
    }

    fn flush_pending_uploads(&self) {
        if let Some(sync) = &self.statusdb {
            let remaining = sync.flush_pending();
            if remaining > 0 {
                warn!("{} status database uploads still pending", remaining);
            }
        }
    }
}

fn run_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
