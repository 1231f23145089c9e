//! On-disk markers of an Illumina run directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::types::RunStatus;

/// Written by the instrument once the last cycle is on disk.
pub const RTA_COMPLETE: &str = "RTAComplete.txt";
/// Final demultiplexing output directory.
pub const DEMUX_DIR: &str = "Demultiplexing";
/// Prefix of per lane-group output directories (`Demultiplexing_<n>`).
pub const PARTIAL_DEMUX_PREFIX: &str = "Demultiplexing_";
/// Written by bcl2fastq as its last step, relative to an output directory.
pub const DEMUX_DONE: &str = "Stats/DemultiplexingStats.xml";
/// Per lane conversion results, relative to an output directory.
pub const STATS_JSON: &str = "Stats/Stats.json";

#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Only the sentinel counts; partially written cycles do not.
    pub fn is_sequencing_done(&self) -> bool {
        self.root.join(RTA_COMPLETE).is_file()
    }

    pub fn demux_dir(&self) -> PathBuf {
        self.root.join(DEMUX_DIR)
    }

    pub fn stats_dir(&self) -> PathBuf {
        self.demux_dir().join("Stats")
    }

    pub fn stats_json(&self) -> PathBuf {
        self.demux_dir().join(STATS_JSON)
    }

    pub fn demux_done_marker(&self) -> PathBuf {
        self.demux_dir().join(DEMUX_DONE)
    }

    pub fn is_demux_done(&self) -> bool {
        is_output_done(&self.demux_dir())
    }

    /// `Demultiplexing_<n>` directories, sorted by `n`.
    pub fn partial_dirs(&self) -> Vec<(usize, PathBuf)> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut dirs: Vec<(usize, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name();
                let n = name
                    .to_str()?
                    .strip_prefix(PARTIAL_DEMUX_PREFIX)?
                    .parse::<usize>()
                    .ok()?;
                Some((n, entry.path()))
            })
            .collect();
        dirs.sort();
        dirs
    }

    pub fn partial_dir(&self, n: usize) -> PathBuf {
        self.root.join(format!("{}{}", PARTIAL_DEMUX_PREFIX, n))
    }

    /// Stage from markers: no sentinel means sequencing; the completion
    /// marker means completed; any started output means in progress.
    pub fn status(&self, demux_started: bool) -> RunStatus {
        if !self.is_sequencing_done() {
            RunStatus::Sequencing
        } else if self.is_demux_done() {
            RunStatus::Completed
        } else if demux_started {
            RunStatus::InProgress
        } else {
            RunStatus::ToStart
        }
    }
}

/// Whether a bcl2fastq output directory carries its completion marker.
pub fn is_output_done(output_dir: &Path) -> bool {
    output_dir.join(DEMUX_DONE).is_file()
}
