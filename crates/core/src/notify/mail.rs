use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

use super::{Notifier, NotifyError};
use crate::run::QcReport;

/// Body of a QC failure mail, headers included.
pub fn qc_failure_message(report: &QcReport, log_file: Option<&Path>) -> String {
    let mut msg = String::new();
    let _ = writeln!(msg, "Subject: [runflow] QC failed for {}", report.run_id);
    let _ = writeln!(msg);
    let _ = writeln!(msg, "Run {} did not pass QC.", report.run_id);

    let failed: Vec<_> = report.failed_lanes().collect();
    if !failed.is_empty() {
        let _ = writeln!(msg);
        let _ = writeln!(msg, "Failing lanes:");
        for lane in failed {
            let _ = writeln!(
                msg,
                "  lane {}: {} PF clusters, {:.2}% undetermined",
                lane.lane, lane.clusters_pf, lane.undetermined_pct
            );
        }
    }
    if !report.failures.is_empty() {
        let _ = writeln!(msg);
        for failure in &report.failures {
            let _ = writeln!(msg, "- {}", failure);
        }
    }
    if let Some(path) = log_file {
        let _ = writeln!(msg);
        let _ = writeln!(msg, "Log: {}", path.display());
    }
    msg
}

/// Pipes the message into a sendmail-compatible command.
#[derive(Debug, Clone)]
pub struct MailNotifier {
    command: PathBuf,
    recipients: Vec<String>,
}

impl MailNotifier {
    pub fn new(command: PathBuf, recipients: Vec<String>) -> Self {
        Self {
            command,
            recipients,
        }
    }
}

impl Notifier for MailNotifier {
    fn notify_qc_failure(&self, report: &QcReport, log_file: Option<&Path>) -> Result<(), NotifyError> {
        let program = self.command.display().to_string();
        let mut child = Command::new(&self.command)
            .args(&self.recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| NotifyError::Spawn {
                program: program.clone(),
                source,
            })?;

        let message = qc_failure_message(report, log_file);
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(message.as_bytes()),
            None => Ok(()),
        };
        let status = child.wait().map_err(|source| NotifyError::Io {
            program: program.clone(),
            source,
        })?;

        if !status.success() {
            return Err(NotifyError::CommandFailed {
                program,
                status: status.to_string(),
            });
        }
        written.map_err(|source| NotifyError::Io { program, source })?;

        info!(
            "QC failure notice for {} sent to {}",
            report.run_id,
            self.recipients.join(", ")
        );
        Ok(())
    }
}
