//! Testing utilities and mock implementations.
//!
//! Mocks stand in for run handles and the external services the orchestrator
//! talks to, recording every call for assertions. `fixtures` lays out
//! Illumina-style run directories on disk for tests that exercise real
//! handles.
//!
//! # Example
//!
//! ```rust,ignore
//! use runflow_core::testing::{MockRunFactory, MockRunHandle};
//! use runflow_core::run::RunStatus;
//!
//! let factory = MockRunFactory::new();
//! let run = factory.register(MockRunHandle::new("150101_X_0001_AHXXXXXX", RunStatus::ToStart));
//!
//! // Hand the factory to a RunOrchestrator, then...
//! assert_eq!(run.call_count("demultiplex"), 1);
//! ```

mod mock_notifier;
mod mock_run;
mod mock_statusdb;

pub use mock_notifier::MockNotifier;
pub use mock_run::{MockRunFactory, MockRunHandle};
pub use mock_statusdb::MockStatusDb;

use std::sync::{Mutex, MutexGuard};

/// Locks a mock's state, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// On-disk run directory fixtures.
pub mod fixtures {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    use crate::run::layout::{DEMUX_DIR, DEMUX_DONE, RTA_COMPLETE, STATS_JSON};

    pub const HISEQX_RUN: &str = "150101_X_0001_AHXXXXXX";
    pub const HISEQ_RUN: &str = "150101_SN7001_0002_BHYYYYYYXX";
    pub const MISEQ_RUN: &str = "150101_M01234_0003_000000000-AB1CD";

    pub const HISEQX_APPLICATION: &str = "HiSeq X Control Software";
    pub const HISEQ_APPLICATION: &str = "HiSeq Control Software";
    pub const MISEQ_APPLICATION: &str = "MiSeq Control Software";

    /// Run parameters descriptor naming `application`.
    pub fn run_parameters(application: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<RunParameters>\n  <Setup>\n    <ApplicationName>{}</ApplicationName>\n  </Setup>\n</RunParameters>\n",
            application
        )
    }

    /// Creates `<root>/<name>` with a descriptor for `application`.
    pub fn create_run(root: &Path, name: &str, application: &str) -> io::Result<PathBuf> {
        let dir = root.join(name);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("runParameters.xml"), run_parameters(application))?;
        Ok(dir)
    }

    /// Writes the sequencing complete sentinel.
    pub fn finish_sequencing(run_dir: &Path) -> io::Result<()> {
        fs::write(run_dir.join(RTA_COMPLETE), "")
    }

    pub fn write_samplesheet(run_dir: &Path, contents: &str) -> io::Result<()> {
        fs::write(run_dir.join("SampleSheet.csv"), contents)
    }

    /// bcl2fastq `Stats.json` for `(lane, pf_clusters, undetermined_reads)`.
    pub fn stats_json(flowcell: &str, lanes: &[(u32, u64, u64)]) -> String {
        let lanes: Vec<String> = lanes
            .iter()
            .map(|(lane, pf, undetermined)| {
                format!(
                    r#"{{"LaneNumber":{},"TotalClustersRaw":{},"TotalClustersPF":{},"Yield":0,"DemuxResults":[],"Undetermined":{{"NumberReads":{},"Yield":0}}}}"#,
                    lane,
                    pf * 2,
                    pf,
                    undetermined
                )
            })
            .collect();
        format!(
            r#"{{"Flowcell":"{}","RunNumber":1,"ConversionResults":[{}],"UnknownBarcodes":[]}}"#,
            flowcell,
            lanes.join(",")
        )
    }

    /// Writes stats and the completion marker into a bcl2fastq output dir.
    pub fn finish_output(output_dir: &Path, lanes: &[(u32, u64, u64)]) -> io::Result<()> {
        fs::create_dir_all(output_dir.join("Stats"))?;
        fs::write(output_dir.join(STATS_JSON), stats_json("FLOWCELL", lanes))?;
        fs::write(output_dir.join(DEMUX_DONE), "<Stats/>")
    }

    /// Makes the run look fully demultiplexed.
    pub fn finish_demultiplexing(run_dir: &Path, lanes: &[(u32, u64, u64)]) -> io::Result<()> {
        finish_output(&run_dir.join(DEMUX_DIR), lanes)
    }
}
