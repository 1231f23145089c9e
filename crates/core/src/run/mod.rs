//! Illumina run directories and the operations the orchestrator drives on them.

mod context;
mod error;
mod factory;
mod hiseq;
mod hiseqx;
pub mod layout;
pub mod process;
mod qc;
mod samplesheet;
mod stats;
mod traits;
mod transfer;
mod types;

pub use context::RunContext;
pub use error::RunError;
pub use factory::IlluminaRunFactory;
pub use hiseq::HiSeqRun;
pub use hiseqx::HiSeqXRun;
pub use qc::evaluate as evaluate_qc;
pub use samplesheet::{LaneGroup, SampleRow, SampleSheet};
pub use stats::{DemuxStats, LaneConversion, UndeterminedReads};
pub use traits::{RunFactory, RunHandle};
pub use transfer::{rsync_args, transfer_run, trigger_analysis};
pub use types::{LaneQc, QcReport, RunId, RunRecord, RunStatus, TransferReport};
