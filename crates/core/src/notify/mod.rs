//! Operator notifications for runs that fail QC.

mod log;
mod mail;

pub use log::LogNotifier;
pub use mail::{qc_failure_message, MailNotifier};

use std::path::Path;
use thiserror::Error;

use crate::config::MailConfig;
use crate::run::QcReport;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to launch mail command {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deliver message to {program}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mail command {program} exited with {status}")]
    CommandFailed { program: String, status: String },
}

/// Delivers QC failure notices.
pub trait Notifier: Send + Sync {
    /// `log_file` is the orchestrator log to point the operator at.
    fn notify_qc_failure(&self, report: &QcReport, log_file: Option<&Path>) -> Result<(), NotifyError>;
}

/// Mail notifier when recipients are configured, log notifier otherwise.
pub fn create_notifier(config: &MailConfig) -> Box<dyn Notifier> {
    if config.recipients.is_empty() {
        Box::new(LogNotifier)
    } else {
        Box::new(MailNotifier::new(config.command.clone(), config.recipients.clone()))
    }
}
