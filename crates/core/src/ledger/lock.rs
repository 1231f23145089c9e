//! Exclusive ledger locks.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::LedgerError;

/// A ledger file opened for appending while holding an exclusive `flock`.
///
/// The lock is released when the value is dropped and the descriptor closed.
pub(crate) struct LockedLedger {
    path: PathBuf,
    file: File,
}

impl LockedLedger {
    /// Opens (creating if needed) and locks the ledger, blocking until any
    /// other holder releases it.
    pub(crate) fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| LedgerError::Append {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|source| LedgerError::Append {
                path: path.to_path_buf(),
                source,
            })?;

        flock_exclusive(&file).map_err(|source| LedgerError::Lock {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Current contents, read under the lock.
    pub(crate) fn contents(&mut self) -> Result<String, LedgerError> {
        let mut contents = String::new();
        self.file
            .read_to_string(&mut contents)
            .map_err(|source| LedgerError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(contents)
    }

    /// Appends one line and flushes it to disk. A torn last line left by a
    /// killed writer is terminated first.
    pub(crate) fn append_line(&mut self, existing: &str, line: &str) -> Result<(), LedgerError> {
        let mut record = String::with_capacity(line.len() + 2);
        if !existing.is_empty() && !existing.ends_with('\n') {
            record.push('\n');
        }
        record.push_str(line);
        record.push('\n');

        self.file
            .write_all(record.as_bytes())
            .and_then(|_| self.file.sync_data())
            .map_err(|source| LedgerError::Append {
                path: self.path.clone(),
                source,
            })
    }
}

/// Reads a ledger without locking. A missing ledger reads as empty.
pub(crate) fn read_ledger(path: &Path) -> Result<String, LedgerError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(LedgerError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn flock_exclusive(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        loop {
            // SAFETY: fd is a valid descriptor owned by `file` for the whole call.
            let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(())
    }
}
