//! Orchestrator lifecycle integration tests.
//!
//! Runs are laid out on disk so discovery and sequencer resolution are real;
//! stage handling is scripted through mock handles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use runflow_core::{
    orchestrator::RunOutcome,
    run::RunStatus,
    statusdb::{StatusDbError, StatusDbSync},
    testing::{fixtures, MockNotifier, MockRunFactory, MockRunHandle, MockStatusDb},
    OrchestratorConfig, OrchestratorError, RunOrchestrator, SequencerType,
};

/// Test helper wiring an orchestrator to mocks over a temporary data root.
struct TestHarness {
    data: PathBuf,
    status: PathBuf,
    factory: Arc<MockRunFactory>,
    notifier: Arc<MockNotifier>,
    db: Arc<MockStatusDb>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data = temp_dir.path().join("data");
        let status = temp_dir.path().join("status");
        fs::create_dir_all(&data).unwrap();

        Self {
            data,
            status,
            factory: Arc::new(MockRunFactory::new()),
            notifier: Arc::new(MockNotifier::new()),
            db: Arc::new(MockStatusDb::new()),
            _temp_dir: temp_dir,
        }
    }

    fn orchestrator(&self, force_transfer: bool) -> RunOrchestrator {
        let config = OrchestratorConfig {
            data_dirs: vec![self.data.clone()],
            transfer_ledger: self.status.join("transfer.tsv"),
            qc_ledger: self.status.join("qc.tsv"),
            force_transfer,
            start_analysis: false,
            archive_dirs: Default::default(),
            log_file: Some(self.status.join("runflow.log")),
        };
        let sync = StatusDbSync::new(self.db.clone(), self.status.join("statusdb_pending"));
        RunOrchestrator::new(
            config,
            self.factory.clone(),
            self.notifier.clone(),
            Some(sync),
        )
    }

    /// Lays out a run directory and registers a scripted handle for it.
    fn add_run(
        &self,
        name: &str,
        application: &str,
        handle: MockRunHandle,
    ) -> Arc<MockRunHandle> {
        let dir = fixtures::create_run(&self.data, name, application).unwrap();
        self.factory.register(handle.with_path(dir))
    }

    fn ledger(&self) -> String {
        fs::read_to_string(self.status.join("transfer.tsv")).unwrap_or_default()
    }

    fn ledger_ids(&self) -> Vec<String> {
        self.ledger()
            .lines()
            .map(|line| line.split('\t').next().unwrap_or_default().to_string())
            .collect()
    }
}

fn run_path(h: &TestHarness, name: &str) -> PathBuf {
    h.data.join(name)
}

#[test]
fn test_sequencing_run_takes_no_action() {
    let h = TestHarness::new();
    let run = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Sequencing),
    );

    let summary = h.orchestrator(false).run_batch().unwrap();

    assert_eq!(summary.outcome(fixtures::HISEQX_RUN), Some(&RunOutcome::Sequencing));
    assert_eq!(h.factory.builds()[0].0, SequencerType::HiSeqX);
    assert_eq!(run.call_count("demultiplex"), 0);
    assert_eq!(run.call_count("transfer"), 0);
    assert!(h.ledger().is_empty());
}

#[test]
fn test_to_start_demultiplexes_exactly_once() {
    let h = TestHarness::new();
    let run = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::ToStart),
    );
    let orchestrator = h.orchestrator(false);

    let first = orchestrator.run_batch().unwrap();
    assert_eq!(
        first.outcome(fixtures::HISEQX_RUN),
        Some(&RunOutcome::DemultiplexStarted)
    );

    let second = orchestrator.run_batch().unwrap();
    assert_eq!(second.outcome(fixtures::HISEQX_RUN), Some(&RunOutcome::InProgress));
    assert_eq!(run.call_count("demultiplex"), 1);
}

#[test]
fn test_passing_run_appended_exactly_once() {
    let h = TestHarness::new();
    let run = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Completed),
    );
    let orchestrator = h.orchestrator(false);

    let summary = orchestrator.run_batch().unwrap();
    assert_eq!(summary.transferred(), 1);
    assert_eq!(h.ledger_ids(), vec![fixtures::HISEQX_RUN.to_string()]);
    let after_first = h.ledger();

    for _ in 0..3 {
        let summary = orchestrator.run_batch().unwrap();
        assert_eq!(
            summary.outcome(fixtures::HISEQX_RUN),
            Some(&RunOutcome::AlreadyTransferred)
        );
    }

    assert_eq!(h.ledger(), after_first);
    assert_eq!(run.call_count("transfer"), 1);
    assert_eq!(h.db.upload_count(), 1);
    assert_eq!(h.db.uploads()[0].qc_passed, Some(true));
}

#[test]
fn test_unchanged_filesystem_is_idempotent() {
    let h = TestHarness::new();
    h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Completed).with_qc(false),
    );
    h.add_run(
        fixtures::HISEQ_RUN,
        fixtures::HISEQ_APPLICATION,
        MockRunHandle::new(fixtures::HISEQ_RUN, RunStatus::InProgress)
            .with_sequencer(SequencerType::HiSeq),
    );
    let orchestrator = h.orchestrator(false);

    orchestrator.run_batch().unwrap();
    let transfer_after_first = h.ledger();
    let qc_after_first = fs::read_to_string(h.status.join("qc.tsv")).unwrap();

    orchestrator.run_batch().unwrap();
    assert_eq!(h.ledger(), transfer_after_first);
    assert_eq!(
        fs::read_to_string(h.status.join("qc.tsv")).unwrap(),
        qc_after_first
    );
    assert_eq!(h.notifier.notified().len(), 1);
}

#[test]
fn test_failed_qc_then_forced_transfer() {
    let h = TestHarness::new();
    let run = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Completed).with_qc(false),
    );
    let path = run_path(&h, fixtures::HISEQX_RUN);

    let outcome = h.orchestrator(false).run_single(&path);
    assert_eq!(outcome, RunOutcome::TransferDeferred);
    assert_eq!(run.call_count("compute_undetermined"), 1);
    assert_eq!(run.call_count("transfer"), 0);
    assert!(h.ledger().is_empty());
    assert_eq!(h.notifier.notified(), vec![fixtures::HISEQX_RUN.to_string()]);
    assert_eq!(
        h.notifier.log_files(),
        vec![Some(h.status.join("runflow.log"))]
    );
    let qc = fs::read_to_string(h.status.join("qc.tsv")).unwrap();
    assert!(qc.starts_with(&format!("{}\tFAILED\t", fixtures::HISEQX_RUN)));

    let forced = h.orchestrator(true);
    assert!(matches!(forced.run_single(&path), RunOutcome::Transferred { .. }));
    assert!(matches!(forced.run_single(&path), RunOutcome::AlreadyTransferred));
    assert_eq!(run.call_count("transfer"), 1);
    assert_eq!(h.ledger_ids(), vec![fixtures::HISEQX_RUN.to_string()]);
}

#[test]
fn test_unknown_instrument_single_run_skips() {
    let h = TestHarness::new();
    let dir = fixtures::create_run(&h.data, "150101_A00001_0004_AHZZZZZZXX", "NovaSeq Control Software")
        .unwrap();

    assert_eq!(h.orchestrator(false).run_single(&dir), RunOutcome::Skipped);
    assert!(h.factory.builds().is_empty());
}

#[test]
fn test_missing_descriptor_single_run_skips() {
    let h = TestHarness::new();
    let dir = h.data.join(fixtures::HISEQX_RUN);
    fs::create_dir_all(&dir).unwrap();

    assert_eq!(h.orchestrator(false).run_single(&dir), RunOutcome::Skipped);
    assert!(h.factory.builds().is_empty());
}

#[test]
fn test_unknown_instrument_batch_is_fatal() {
    let h = TestHarness::new();
    let unknown = fixtures::create_run(
        &h.data,
        "150101_A00001_0004_AHZZZZZZXX",
        "NovaSeq Control Software",
    )
    .unwrap();
    // Sorts after the unknown run, so the batch must stop before reaching it.
    let sibling = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Completed),
    );

    let err = h.orchestrator(false).run_batch().unwrap_err();
    match err {
        OrchestratorError::UnsupportedInstrument { path } => assert_eq!(path, unknown),
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.factory.builds().is_empty());
    assert!(sibling.calls().is_empty());
    assert!(h.ledger().is_empty());
}

#[test]
fn test_run_failure_does_not_abort_siblings() {
    let h = TestHarness::new();
    let broken = h.add_run(
        fixtures::HISEQ_RUN,
        fixtures::HISEQ_APPLICATION,
        MockRunHandle::new(fixtures::HISEQ_RUN, RunStatus::Completed).with_transfer_error(),
    );
    let healthy = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Completed),
    );

    let summary = h.orchestrator(true).run_batch().unwrap();

    assert_eq!(summary.runs.len(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.transferred(), 1);
    assert_eq!(broken.call_count("transfer"), 1);
    assert_eq!(healthy.call_count("transfer"), 1);
    assert_eq!(h.ledger_ids(), vec![fixtures::HISEQX_RUN.to_string()]);
}

#[test]
fn test_family_without_handle_is_skipped() {
    let h = TestHarness::new();
    let other = h.data.join("miseq");
    fs::create_dir_all(&other).unwrap();
    fixtures::create_run(&other, fixtures::MISEQ_RUN, fixtures::MISEQ_APPLICATION).unwrap();

    let config = OrchestratorConfig {
        data_dirs: vec![other],
        transfer_ledger: h.status.join("transfer.tsv"),
        qc_ledger: h.status.join("qc.tsv"),
        force_transfer: true,
        start_analysis: false,
        archive_dirs: Default::default(),
        log_file: None,
    };
    let orchestrator = RunOrchestrator::new(config, h.factory.clone(), h.notifier.clone(), None);

    let summary = orchestrator.run_batch().unwrap();
    assert_eq!(summary.outcome(fixtures::MISEQ_RUN), Some(&RunOutcome::Skipped));
    assert_eq!(h.factory.builds()[0].0, SequencerType::MiSeq);
}

#[test]
fn test_pending_upload_retried_next_invocation() {
    let h = TestHarness::new();
    h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Completed),
    );
    h.db.fail_next(StatusDbError::Connection("refused".into()));
    let orchestrator = h.orchestrator(false);

    let summary = orchestrator.run_batch().unwrap();
    assert_eq!(summary.transferred(), 1);
    assert_eq!(h.db.upload_count(), 0);
    assert!(pending_files(&h.status).len() == 1);

    orchestrator.run_batch().unwrap();
    assert_eq!(h.db.upload_count(), 1);
    assert!(pending_files(&h.status).is_empty());
}

#[test]
fn test_manual_transfer_respects_ledger() {
    let h = TestHarness::new();
    let run = h.add_run(
        fixtures::HISEQX_RUN,
        fixtures::HISEQX_APPLICATION,
        MockRunHandle::new(fixtures::HISEQX_RUN, RunStatus::Sequencing),
    );
    let path = run_path(&h, fixtures::HISEQX_RUN);
    let orchestrator = h.orchestrator(false);

    assert!(matches!(
        orchestrator.transfer_single(&path, false, false).unwrap(),
        RunOutcome::Transferred { .. }
    ));
    assert_eq!(
        orchestrator.transfer_single(&path, false, false).unwrap(),
        RunOutcome::AlreadyTransferred
    );
    assert!(matches!(
        orchestrator.transfer_single(&path, false, true).unwrap(),
        RunOutcome::Transferred { .. }
    ));

    assert_eq!(run.call_count("transfer"), 2);
    assert_eq!(h.ledger_ids(), vec![fixtures::HISEQX_RUN.to_string()]);
}

fn pending_files(status: &Path) -> Vec<PathBuf> {
    match fs::read_dir(status.join("statusdb_pending")) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
