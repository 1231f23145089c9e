//! Append-only ledgers kept in the status directory.
//!
//! - `transfer.tsv`: the only authority for "this run has been transferred".
//! - `qc.tsv`: audit trail of QC evaluations.
//!
//! Appends hold an exclusive lock on the ledger file so several orchestrator
//! processes can share one status directory.

mod lock;
mod qc;
mod transfer;

pub use qc::{QcLedger, QcLedgerEntry};
pub use transfer::{TransferEntry, TransferLedger};

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or appending a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to ledger {path}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock ledger {path}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
