//! Mock run handles and factory for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::lock;
use crate::run::{
    LaneQc, QcReport, RunError, RunFactory, RunHandle, RunId, RunRecord, RunStatus,
    TransferReport,
};
use crate::sequencer::SequencerType;

#[derive(Debug, Clone, Copy)]
enum TransferBehaviour {
    Dispatched { success: bool },
    Error,
}

/// Scripted run handle.
///
/// The stage lives in memory and moves the way a real run's markers would:
/// `demultiplex` moves TO_START to IN_PROGRESS, and `check_run_status` moves
/// IN_PROGRESS to COMPLETED when built with [`completing_on_check`].
/// Every trait call is recorded by name.
///
/// [`completing_on_check`]: MockRunHandle::completing_on_check
#[derive(Debug)]
pub struct MockRunHandle {
    id: RunId,
    path: PathBuf,
    sequencer: SequencerType,
    status: Mutex<RunStatus>,
    complete_on_check: bool,
    undetermined: bool,
    qc_passed: bool,
    transfer: TransferBehaviour,
    calls: Mutex<Vec<String>>,
}

impl MockRunHandle {
    /// HiSeq X run named `name` under `/data`.
    pub fn new(name: &str, status: RunStatus) -> Self {
        Self {
            id: RunId::parse(name),
            path: PathBuf::from("/data").join(name),
            sequencer: SequencerType::HiSeqX,
            status: Mutex::new(status),
            complete_on_check: false,
            undetermined: true,
            qc_passed: true,
            transfer: TransferBehaviour::Dispatched { success: true },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_sequencer(mut self, sequencer: SequencerType) -> Self {
        self.sequencer = sequencer;
        self
    }

    pub fn completing_on_check(mut self) -> Self {
        self.complete_on_check = true;
        self
    }

    pub fn with_undetermined(mut self, succeeds: bool) -> Self {
        self.undetermined = succeeds;
        self
    }

    pub fn with_qc(mut self, passed: bool) -> Self {
        self.qc_passed = passed;
        self
    }

    /// Transfer is dispatched but the copy reports `success`.
    pub fn with_transfer_success(mut self, success: bool) -> Self {
        self.transfer = TransferBehaviour::Dispatched { success };
        self
    }

    /// Transfer cannot be dispatched at all.
    pub fn with_transfer_error(mut self) -> Self {
        self.transfer = TransferBehaviour::Error;
        self
    }

    pub fn set_status(&self, status: RunStatus) {
        *lock(&self.status) = status;
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == name).count()
    }

    fn record(&self, name: &str) {
        lock(&self.calls).push(name.to_string());
    }

    fn qc_report(&self) -> QcReport {
        let lane = LaneQc {
            lane: 1,
            clusters_pf: if self.qc_passed { 400_000_000 } else { 1_000 },
            undetermined_reads: 0,
            undetermined_pct: 0.0,
            yield_bases: 0,
            passed: self.qc_passed,
        };
        QcReport {
            run_id: self.id.id.clone(),
            passed: self.qc_passed,
            lanes: vec![lane],
            failures: if self.qc_passed {
                Vec::new()
            } else {
                vec!["lane 1: 1000 PF clusters below minimum".to_string()]
            },
        }
    }
}

impl RunHandle for MockRunHandle {
    fn run_id(&self) -> &RunId {
        &self.id
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn sequencer_type(&self) -> SequencerType {
        self.sequencer
    }

    fn run_status(&self) -> Result<RunStatus, RunError> {
        self.record("run_status");
        Ok(*lock(&self.status))
    }

    fn demultiplex(&self) -> Result<(), RunError> {
        self.record("demultiplex");
        let mut status = lock(&self.status);
        if *status == RunStatus::ToStart {
            *status = RunStatus::InProgress;
        }
        Ok(())
    }

    fn check_run_status(&self) -> Result<(), RunError> {
        self.record("check_run_status");
        let mut status = lock(&self.status);
        if self.complete_on_check && *status == RunStatus::InProgress {
            *status = RunStatus::Completed;
        }
        Ok(())
    }

    fn compute_undetermined(&self) -> Result<bool, RunError> {
        self.record("compute_undetermined");
        Ok(self.undetermined)
    }

    fn evaluate_qc(&self) -> Result<QcReport, RunError> {
        self.record("evaluate_qc");
        Ok(self.qc_report())
    }

    fn run_record(&self) -> Result<RunRecord, RunError> {
        self.record("run_record");
        Ok(RunRecord {
            run_id: self.id.clone(),
            sequencer_type: self.sequencer,
            application_name: None,
            lanes: self.qc_report().lanes,
            qc_passed: None,
        })
    }

    fn transfer(
        &self,
        archive_root: Option<&Path>,
        start_analysis: bool,
    ) -> Result<TransferReport, RunError> {
        self.record("transfer");
        match self.transfer {
            TransferBehaviour::Error => Err(RunError::Spawn {
                program: "rsync".to_string(),
                source: std::io::Error::other("mock transfer error"),
            }),
            TransferBehaviour::Dispatched { success } => Ok(TransferReport {
                run_id: self.id.id.clone(),
                destination: "mock:/incoming".to_string(),
                success,
                exit_code: Some(if success { 0 } else { 23 }),
                archived_to: archive_root
                    .filter(|_| success)
                    .map(|root| root.join(&self.id.id)),
                analysis_started: success && start_analysis,
            }),
        }
    }
}

impl RunHandle for Arc<MockRunHandle> {
    fn run_id(&self) -> &RunId {
        self.as_ref().run_id()
    }

    fn path(&self) -> &Path {
        self.as_ref().path()
    }

    fn sequencer_type(&self) -> SequencerType {
        self.as_ref().sequencer_type()
    }

    fn run_status(&self) -> Result<RunStatus, RunError> {
        self.as_ref().run_status()
    }

    fn demultiplex(&self) -> Result<(), RunError> {
        self.as_ref().demultiplex()
    }

    fn check_run_status(&self) -> Result<(), RunError> {
        self.as_ref().check_run_status()
    }

    fn compute_undetermined(&self) -> Result<bool, RunError> {
        self.as_ref().compute_undetermined()
    }

    fn evaluate_qc(&self) -> Result<QcReport, RunError> {
        self.as_ref().evaluate_qc()
    }

    fn run_record(&self) -> Result<RunRecord, RunError> {
        self.as_ref().run_record()
    }

    fn transfer(
        &self,
        archive_root: Option<&Path>,
        start_analysis: bool,
    ) -> Result<TransferReport, RunError> {
        self.as_ref().transfer(archive_root, start_analysis)
    }
}

/// Factory handing out registered mock handles by run directory name.
///
/// Unregistered runs get no handle, like an instrument family without an
/// implementation. Every build request is recorded.
#[derive(Debug, Default)]
pub struct MockRunFactory {
    handles: Mutex<HashMap<String, Arc<MockRunHandle>>>,
    builds: Mutex<Vec<(SequencerType, PathBuf)>>,
}

impl MockRunFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under its run id and returns it for inspection.
    pub fn register(&self, handle: MockRunHandle) -> Arc<MockRunHandle> {
        let handle = Arc::new(handle);
        lock(&self.handles).insert(handle.run_id().id.clone(), Arc::clone(&handle));
        handle
    }

    pub fn builds(&self) -> Vec<(SequencerType, PathBuf)> {
        lock(&self.builds).clone()
    }
}

impl RunFactory for MockRunFactory {
    fn build(&self, sequencer: SequencerType, run_dir: &Path) -> Option<Box<dyn RunHandle>> {
        lock(&self.builds).push((sequencer, run_dir.to_path_buf()));
        let name = run_dir.file_name()?.to_string_lossy().into_owned();
        let handle = lock(&self.handles).get(&name).cloned()?;
        Some(Box::new(handle))
    }
}
