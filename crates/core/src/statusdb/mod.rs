//! Status database synchronisation.
//!
//! Run records are pushed after a run completes. Uploads never block a
//! transfer: transient failures are queued on disk and retried by later
//! invocations, permanent ones are logged and dropped.

mod couch;
mod sync;

pub use couch::{content_hash, CouchStatusDb};
pub use sync::{StatusDbSync, UploadOutcome};

use std::path::PathBuf;
use thiserror::Error;

use crate::run::RunRecord;

/// Errors talking to the status database.
#[derive(Debug, Error)]
pub enum StatusDbError {
    #[error("connection to status database failed: {0}")]
    Connection(String),

    #[error("status database request timed out: {0}")]
    Timeout(String),

    #[error("status database returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed status database response: {0}")]
    Malformed(String),

    #[error("failed to serialize run record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("pending upload queue error on {path}")]
    Queue {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StatusDbError {
    /// Whether retrying later may succeed. Conflicts count as transient since
    /// another writer moved the revision under us.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 409,
            Self::Malformed(_) | Self::Serialize(_) | Self::Queue { .. } => false,
        }
    }
}

impl From<reqwest::Error> for StatusDbError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// Store of run documents. Uploading identical content twice is a no-op.
pub trait StatusDb: Send + Sync {
    /// Creates or updates the document for `record`. Returns `false` when the
    /// stored document already had the same content.
    fn upload_run_record(&self, record: &RunRecord) -> Result<bool, StatusDbError>;
}
