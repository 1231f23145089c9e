use std::path::Path;
use tracing::warn;

use super::{Notifier, NotifyError};
use crate::run::QcReport;

/// Writes QC failures to the log instead of mailing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_qc_failure(&self, report: &QcReport, log_file: Option<&Path>) -> Result<(), NotifyError> {
        let lanes: Vec<String> = report.failed_lanes().map(|l| l.lane.to_string()).collect();
        warn!(
            "Run {} failed QC (lanes: {}; {})",
            report.run_id,
            if lanes.is_empty() { "-".to_string() } else { lanes.join(",") },
            report.failures.join("; ")
        );
        if let Some(path) = log_file {
            warn!("See {} for details", path.display());
        }
        Ok(())
    }
}
