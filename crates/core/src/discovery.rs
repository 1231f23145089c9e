//! Run directory discovery across the configured data roots.
//!
//! Discovery only looks at directory names. Whether a run is ready for any
//! processing is decided later from its on-disk markers.

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::vec;
use tracing::{debug, warn};

/// HiSeq-family run: `<date>_<instrument>_<number>_<position><flowcell>`,
/// flowcell ids ending in `XX`.
const HISEQ_RUN_PATTERN: &str = r"^1\d{5}_[A-Za-z0-9-]+_\d+_[A-Za-z0-9]+XX$";

/// MiSeq-family run: the flowcell carries a zero padded serial,
/// e.g. `000000000-AB1CD`.
const MISEQ_RUN_PATTERN: &str = r"^1\d{5}_[A-Za-z0-9-]+_\d+_0{9}-[A-Za-z0-9]+$";

/// Lazily scans data roots for run directories.
///
/// Roots are listed one at a time as the iterator advances. Within a root,
/// HiSeq-family names are returned; when a root holds none, MiSeq-family
/// names are tried instead. The sequence is finite and not restartable.
pub struct RunDiscovery {
    roots: vec::IntoIter<PathBuf>,
    current: vec::IntoIter<PathBuf>,
    hiseq: Regex,
    miseq: Regex,
}

impl RunDiscovery {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots: Vec<PathBuf> = roots
            .into_iter()
            .map(|root| root.as_ref().to_path_buf())
            .collect();

        Self {
            roots: roots.into_iter(),
            current: Vec::new().into_iter(),
            hiseq: Regex::new(HISEQ_RUN_PATTERN).expect("valid HiSeq run pattern"),
            miseq: Regex::new(MISEQ_RUN_PATTERN).expect("valid MiSeq run pattern"),
        }
    }

    fn scan_root(&self, root: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list data directory {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                Some((name, entry.path()))
            })
            .collect();

        let mut runs = select(&dirs, &self.hiseq);
        if runs.is_empty() {
            runs = select(&dirs, &self.miseq);
        }
        runs.sort();

        debug!("Found {} candidate runs in {}", runs.len(), root.display());
        runs
    }
}

fn select(dirs: &[(String, PathBuf)], pattern: &Regex) -> Vec<PathBuf> {
    dirs.iter()
        .filter(|(name, _)| pattern.is_match(name))
        .map(|(_, path)| path.clone())
        .collect()
}

impl Iterator for RunDiscovery {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(run) = self.current.next() {
                return Some(run);
            }
            let root = self.roots.next()?;
            self.current = self.scan_root(&root).into_iter();
        }
    }
}
