//! HiSeq X runs: every lane is indexed and demultiplexed in one pass.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::RunContext;
use super::error::RunError;
use super::process::spawn_detached;
use super::traits::RunHandle;
use super::transfer::transfer_run;
use super::types::{QcReport, RunId, RunRecord, RunStatus, TransferReport};
use crate::config::Config;
use crate::sequencer::SequencerType;

#[derive(Debug, Clone)]
pub struct HiSeqXRun {
    ctx: RunContext,
}

impl HiSeqXRun {
    pub fn new(run_dir: &Path, config: Arc<Config>) -> Self {
        Self {
            ctx: RunContext::new(run_dir, SequencerType::HiSeqX, config),
        }
    }

    fn is_demux_started(&self) -> bool {
        self.ctx.layout.demux_dir().is_dir()
    }
}

impl RunHandle for HiSeqXRun {
    fn run_id(&self) -> &RunId {
        &self.ctx.id
    }

    fn path(&self) -> &Path {
        self.ctx.path()
    }

    fn sequencer_type(&self) -> SequencerType {
        SequencerType::HiSeqX
    }

    fn run_status(&self) -> Result<RunStatus, RunError> {
        Ok(self.ctx.layout.status(self.is_demux_started()))
    }

    fn demultiplex(&self) -> Result<(), RunError> {
        let output_dir = self.ctx.layout.demux_dir();
        if output_dir.exists() {
            debug!("Run {} already has {}", self.ctx.id, output_dir.display());
            return Ok(());
        }

        let samplesheet = self.ctx.samplesheet_path();
        if !samplesheet.is_file() {
            return Err(RunError::sample_sheet(&samplesheet, "file not found"));
        }

        fs::create_dir(&output_dir).map_err(|e| RunError::io(&output_dir, e))?;
        let args = self.ctx.bcl2fastq_args(&output_dir, &samplesheet, &[]);
        match spawn_detached(
            &self.ctx.family.bcl2fastq,
            &args,
            self.path(),
            &output_dir.join("bcl2fastq"),
        ) {
            Ok(pid) => {
                info!("bcl2fastq started for run {} (pid {})", self.ctx.id, pid);
                Ok(())
            }
            Err(e) => {
                // Leave the run in TO_START so the next invocation retries.
                if let Err(cleanup) = fs::remove_dir_all(&output_dir) {
                    warn!(
                        "Could not remove {} after failed start: {}",
                        output_dir.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    fn check_run_status(&self) -> Result<(), RunError> {
        debug!("Run {}: bcl2fastq still running", self.ctx.id);
        Ok(())
    }

    fn compute_undetermined(&self) -> Result<bool, RunError> {
        Ok(true)
    }

    fn evaluate_qc(&self) -> Result<QcReport, RunError> {
        self.ctx.evaluate_qc()
    }

    fn run_record(&self) -> Result<RunRecord, RunError> {
        self.ctx.run_record()
    }

    fn transfer(
        &self,
        archive_root: Option<&Path>,
        start_analysis: bool,
    ) -> Result<TransferReport, RunError> {
        transfer_run(&self.ctx, archive_root, start_analysis)
    }
}
