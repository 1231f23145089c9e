//! Upload with an on-disk retry queue.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{StatusDb, StatusDbError};
use crate::run::RunRecord;

/// What happened to one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Unchanged,
    /// Transient failure; queued for the next invocation.
    Queued,
    /// Permanent failure; logged and discarded.
    Dropped,
}

/// Status database uploads that survive transient failures.
///
/// Queued records live in `<pending_dir>/<run_id>.json`; a newer record for
/// the same run replaces the queued one.
#[derive(Clone)]
pub struct StatusDbSync {
    db: Arc<dyn StatusDb>,
    pending_dir: PathBuf,
}

impl StatusDbSync {
    pub fn new(db: Arc<dyn StatusDb>, pending_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            pending_dir: pending_dir.into(),
        }
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending_dir
    }

    /// Uploads `record`. Never fails: the outcome says what happened.
    pub fn upload(&self, record: &RunRecord) -> UploadOutcome {
        let run_id = record.run_id.id.as_str();
        let outcome = match self.db.upload_run_record(record) {
            Ok(true) => UploadOutcome::Uploaded,
            Ok(false) => UploadOutcome::Unchanged,
            Err(e) if e.is_transient() => {
                warn!("Status database upload for {} failed, will retry: {}", run_id, e);
                return match self.enqueue(record) {
                    Ok(path) => {
                        info!("Queued status database upload for {} at {}", run_id, path.display());
                        UploadOutcome::Queued
                    }
                    Err(e) => {
                        error!("Could not queue status database upload for {}: {}", run_id, e);
                        UploadOutcome::Dropped
                    }
                };
            }
            Err(e) => {
                warn!("Status database upload for {} failed permanently: {}", run_id, e);
                UploadOutcome::Dropped
            }
        };

        self.discard(&self.pending_path(run_id));
        outcome
    }

    /// Retries every queued upload. Returns how many are still queued.
    pub fn flush_pending(&self) -> usize {
        let queued = match self.pending() {
            Ok(queued) => queued,
            Err(e) => {
                warn!("Could not list pending status database uploads: {}", e);
                return 0;
            }
        };

        let mut remaining = 0;
        for path in queued {
            let record = match read_record(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Discarding unreadable pending upload {}: {}", path.display(), e);
                    self.discard(&path);
                    continue;
                }
            };

            match self.db.upload_run_record(&record) {
                Ok(_) => {
                    info!("Pending status database upload for {} completed", record.run_id);
                    self.discard(&path);
                }
                Err(e) if e.is_transient() => {
                    debug!("Pending upload for {} still failing: {}", record.run_id, e);
                    remaining += 1;
                }
                Err(e) => {
                    warn!(
                        "Dropping pending upload for {} after permanent failure: {}",
                        record.run_id, e
                    );
                    self.discard(&path);
                }
            }
        }
        remaining
    }

    /// Queued record files, sorted.
    pub fn pending(&self) -> Result<Vec<PathBuf>, StatusDbError> {
        let entries = match fs::read_dir(&self.pending_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.queue_error(&self.pending_dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| self.queue_error(&self.pending_dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn pending_path(&self, run_id: &str) -> PathBuf {
        self.pending_dir.join(format!("{}.json", run_id))
    }

    fn enqueue(&self, record: &RunRecord) -> Result<PathBuf, StatusDbError> {
        fs::create_dir_all(&self.pending_dir)
            .map_err(|e| self.queue_error(&self.pending_dir, e))?;

        let path = self.pending_path(&record.run_id.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?).map_err(|e| self.queue_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| self.queue_error(&path, e))?;
        Ok(path)
    }

    fn discard(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove pending upload {}: {}", path.display(), e),
        }
    }

    fn queue_error(&self, path: &Path, source: std::io::Error) -> StatusDbError {
        StatusDbError::Queue {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn read_record(path: &Path) -> Result<RunRecord, StatusDbError> {
    let bytes = fs::read(path).map_err(|source| StatusDbError::Queue {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}
