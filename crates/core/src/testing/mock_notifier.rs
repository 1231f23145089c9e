//! Mock notifier for testing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::lock;
use crate::notify::{Notifier, NotifyError};
use crate::run::QcReport;

/// Records the run ids and log paths it was asked to notify about.
#[derive(Debug, Default)]
pub struct MockNotifier {
    notices: Mutex<Vec<(String, Option<PathBuf>)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run ids notified so far, in order.
    pub fn notified(&self) -> Vec<String> {
        lock(&self.notices).iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn log_files(&self) -> Vec<Option<PathBuf>> {
        lock(&self.notices).iter().map(|(_, log)| log.clone()).collect()
    }
}

impl Notifier for MockNotifier {
    fn notify_qc_failure(&self, report: &QcReport, log_file: Option<&Path>) -> Result<(), NotifyError> {
        lock(&self.notices).push((report.run_id.clone(), log_file.map(Path::to_path_buf)));
        Ok(())
    }
}
