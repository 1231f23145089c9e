//! Transfer ledger (`transfer.tsv`).

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::lock::{read_ledger, LockedLedger};
use super::LedgerError;

/// One ledger line: `run_id<TAB>dispatched_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEntry {
    pub run_id: String,
    /// Absent on lines written without a timestamp.
    pub transferred_at: Option<DateTime<Utc>>,
}

impl TransferEntry {
    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split('\t');
        let run_id = fields.next()?.trim();
        if run_id.is_empty() {
            return None;
        }
        let transferred_at = fields
            .next()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())
            .map(|ts| ts.with_timezone(&Utc));
        Some(Self {
            run_id: run_id.to_string(),
            transferred_at,
        })
    }
}

/// Append-only record of runs whose transfer has been dispatched.
#[derive(Debug, Clone)]
pub struct TransferLedger {
    path: PathBuf,
}

impl TransferLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the run id has an entry. A missing ledger file is empty.
    pub fn is_transferred(&self, run_id: &str) -> Result<bool, LedgerError> {
        let contents = read_ledger(&self.path)?;
        Ok(contains(&contents, run_id))
    }

    /// Records a dispatched transfer.
    ///
    /// Membership is re-checked while holding the exclusive lock, so
    /// concurrent writers never produce a duplicate entry. Returns `false`
    /// when the run was already recorded.
    pub fn record_transferred(&self, run_id: &str) -> Result<bool, LedgerError> {
        let mut ledger = LockedLedger::open(&self.path)?;
        let existing = ledger.contents()?;
        if contains(&existing, run_id) {
            debug!("Run {} already present in {}", run_id, self.path.display());
            return Ok(false);
        }

        let line = format!("{}\t{}", run_id, Utc::now().to_rfc3339());
        ledger.append_line(&existing, &line)?;
        Ok(true)
    }

    /// All entries in file order.
    pub fn entries(&self) -> Result<Vec<TransferEntry>, LedgerError> {
        let contents = read_ledger(&self.path)?;
        Ok(contents.lines().filter_map(TransferEntry::parse).collect())
    }
}

fn contains(contents: &str, run_id: &str) -> bool {
    contents
        .lines()
        .filter_map(TransferEntry::parse)
        .any(|entry| entry.run_id == run_id)
}
