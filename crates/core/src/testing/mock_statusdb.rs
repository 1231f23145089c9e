//! Mock status database for testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::lock;
use crate::run::RunRecord;
use crate::statusdb::{StatusDb, StatusDbError};

/// Records uploaded run records; failures can be scripted one at a time.
#[derive(Debug, Default)]
pub struct MockStatusDb {
    uploads: Mutex<Vec<RunRecord>>,
    failures: Mutex<VecDeque<StatusDbError>>,
}

impl MockStatusDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next upload fails with `error`. Calls queue up.
    pub fn fail_next(&self, error: StatusDbError) {
        lock(&self.failures).push_back(error);
    }

    pub fn uploads(&self) -> Vec<RunRecord> {
        lock(&self.uploads).clone()
    }

    pub fn upload_count(&self) -> usize {
        lock(&self.uploads).len()
    }
}

impl StatusDb for MockStatusDb {
    fn upload_run_record(&self, record: &RunRecord) -> Result<bool, StatusDbError> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        let mut uploads = lock(&self.uploads);
        let changed = uploads.last() != Some(record);
        uploads.push(record.clone());
        Ok(changed)
    }
}
