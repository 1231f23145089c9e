//! Error types for run handles.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by per-run operations.
#[derive(Debug, Error)]
pub enum RunError {
    /// Filesystem error on a run path.
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external program could not be started.
    #[error("failed to launch {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Sample sheet missing or unusable.
    #[error("invalid sample sheet {path}: {reason}")]
    SampleSheet { path: PathBuf, reason: String },

    /// Demultiplexing statistics missing or unusable.
    #[error("invalid demultiplexing stats {path}: {reason}")]
    Stats { path: PathBuf, reason: String },

    /// The analysis server rejected or did not answer the start request.
    #[error("analysis trigger failed for {run_id}: {reason}")]
    AnalysisTrigger { run_id: String, reason: String },
}

impl RunError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn sample_sheet(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SampleSheet {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn stats(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Stats {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether a later invocation may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Spawn { .. } | Self::AnalysisTrigger { .. }
        )
    }
}
