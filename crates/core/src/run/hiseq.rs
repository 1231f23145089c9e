//! HiSeq runs.
//!
//! Lanes are split into groups with the same index shape and each group is
//! demultiplexed into its own `Demultiplexing_<n>` directory. Once every
//! group has finished, `check_run_status` aggregates the partial outputs into
//! `Demultiplexing/` and writes the completion marker last, which is what
//! moves the run to COMPLETED.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::context::RunContext;
use super::error::RunError;
use super::layout::{is_output_done, DEMUX_DONE, STATS_JSON};
use super::process::{run_to_completion, spawn_detached};
use super::samplesheet::{LaneGroup, SampleSheet};
use super::stats::DemuxStats;
use super::traits::RunHandle;
use super::transfer::transfer_run;
use super::types::{QcReport, RunId, RunRecord, RunStatus, TransferReport};
use crate::config::Config;
use crate::sequencer::SequencerType;

/// Partial output entries that stay behind during aggregation.
const PARTIAL_ONLY: &[&str] = &["Stats", "Reports", "bcl2fastq.out", "bcl2fastq.err"];

/// Log stem of bcl2fastq inside a partial output directory.
const BCL2FASTQ_LOG: &str = "bcl2fastq";

/// A partial counts once bcl2fastq was launched into it, not when the
/// directory merely exists.
fn is_partial_started(dir: &Path) -> bool {
    dir.join(BCL2FASTQ_LOG).with_extension("out").is_file() || is_output_done(dir)
}

#[derive(Debug, Clone)]
pub struct HiSeqRun {
    ctx: RunContext,
}

impl HiSeqRun {
    pub fn new(run_dir: &Path, config: Arc<Config>) -> Self {
        Self {
            ctx: RunContext::new(run_dir, SequencerType::HiSeq, config),
        }
    }

    fn is_demux_started(&self) -> bool {
        self.ctx.layout.demux_dir().is_dir()
            || self
                .ctx
                .layout
                .partial_dirs()
                .iter()
                .any(|(_, dir)| is_partial_started(dir))
    }

    /// Removes partial directories and sample sheets that never got a
    /// running bcl2fastq.
    fn remove_partials(&self, partials: &[(usize, PathBuf)]) {
        for (n, dir) in partials {
            if dir.exists() {
                if let Err(e) = fs::remove_dir_all(dir) {
                    warn!("Could not remove {}: {}", dir.display(), e);
                }
            }
            let samplesheet = self.group_samplesheet(*n);
            if samplesheet.exists() {
                if let Err(e) = fs::remove_file(&samplesheet) {
                    warn!("Could not remove {}: {}", samplesheet.display(), e);
                }
            }
        }
    }

    fn group_samplesheet(&self, n: usize) -> PathBuf {
        self.path().join(format!("SampleSheet_{}.csv", n))
    }

    fn start_group(
        &self,
        n: usize,
        sheet: &SampleSheet,
        group: &LaneGroup,
    ) -> Result<(), RunError> {
        let samplesheet = self.group_samplesheet(n);
        fs::write(&samplesheet, sheet.subset(&group.lanes))
            .map_err(|e| RunError::io(&samplesheet, e))?;

        let output_dir = self.ctx.layout.partial_dir(n);
        fs::create_dir(&output_dir).map_err(|e| RunError::io(&output_dir, e))?;

        let args = self
            .ctx
            .bcl2fastq_args(&output_dir, &samplesheet, &group.lanes);
        let pid = spawn_detached(
            &self.ctx.family.bcl2fastq,
            &args,
            self.path(),
            &output_dir.join(BCL2FASTQ_LOG),
        )?;
        info!(
            "bcl2fastq started for run {} lanes {:?} index {:?} (pid {})",
            self.ctx.id, group.lanes, group.index_lengths, pid
        );
        Ok(())
    }

    fn undetermined_output(&self, lane: u32) -> PathBuf {
        self.ctx
            .layout
            .stats_dir()
            .join(format!("Undetermined_L{:03}.tsv", lane))
    }

    /// Moves partial outputs into `Demultiplexing/`, merges their stats and
    /// writes the completion marker. Safe to repeat after an interruption.
    fn aggregate(&self, partials: &[(usize, PathBuf)]) -> Result<(), RunError> {
        let layout = &self.ctx.layout;
        let stats_dir = layout.stats_dir();
        fs::create_dir_all(&stats_dir).map_err(|e| RunError::io(&stats_dir, e))?;

        let mut parts = Vec::with_capacity(partials.len());
        for (_, partial) in partials {
            parts.push(DemuxStats::read(&partial.join(STATS_JSON))?);

            let entries = fs::read_dir(partial).map_err(|e| RunError::io(partial, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| RunError::io(partial, e))?;
                let name = entry.file_name();
                if PARTIAL_ONLY.iter().any(|keep| name == *keep) {
                    continue;
                }
                merge_into(&entry.path(), &layout.demux_dir().join(&name))?;
            }
        }

        DemuxStats::merge(parts).write(&layout.stats_json())?;

        let sources: Vec<String> = partials
            .iter()
            .map(|(_, p)| format!("  <Partial>{}</Partial>", p.display()))
            .collect();
        let marker = layout.demux_done_marker();
        fs::write(
            &marker,
            format!("<Aggregated>\n{}\n</Aggregated>\n", sources.join("\n")),
        )
        .map_err(|e| RunError::io(&marker, e))?;

        info!(
            "Run {}: aggregated {} partial demultiplexing outputs",
            self.ctx.id,
            partials.len()
        );
        Ok(())
    }
}

/// Moves `src` to `dst`. Directories present on both sides are merged entry by
/// entry; a file already present at `dst` is left alone.
fn merge_into(src: &Path, dst: &Path) -> Result<(), RunError> {
    if !dst.exists() {
        return fs::rename(src, dst).map_err(|e| RunError::io(dst, e));
    }
    if src.is_dir() && dst.is_dir() {
        let entries = fs::read_dir(src).map_err(|e| RunError::io(src, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| RunError::io(src, e))?;
            merge_into(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }
    warn!("Not overwriting {} with {}", dst.display(), src.display());
    Ok(())
}

impl RunHandle for HiSeqRun {
    fn run_id(&self) -> &RunId {
        &self.ctx.id
    }

    fn path(&self) -> &Path {
        self.ctx.path()
    }

    fn sequencer_type(&self) -> SequencerType {
        SequencerType::HiSeq
    }

    fn run_status(&self) -> Result<RunStatus, RunError> {
        Ok(self.ctx.layout.status(self.is_demux_started()))
    }

    fn demultiplex(&self) -> Result<(), RunError> {
        if self.is_demux_started() {
            debug!("Run {} already has demultiplexing output", self.ctx.id);
            return Ok(());
        }

        let stale = self.ctx.layout.partial_dirs();
        if !stale.is_empty() {
            warn!(
                "Run {}: removing {} partial directories from an earlier failed start",
                self.ctx.id,
                stale.len()
            );
            self.remove_partials(&stale);
        }

        let sheet = SampleSheet::read(&self.ctx.samplesheet_path())?;
        let groups = sheet.lane_groups();

        for (n, group) in groups.iter().enumerate() {
            if let Err(e) = self.start_group(n, &sheet, group) {
                // Leave the run in TO_START so the next invocation retries.
                let created: Vec<(usize, PathBuf)> = (0..=n)
                    .map(|i| (i, self.ctx.layout.partial_dir(i)))
                    .collect();
                self.remove_partials(&created);
                return Err(e);
            }
        }
        Ok(())
    }

    fn check_run_status(&self) -> Result<(), RunError> {
        if self.ctx.layout.is_demux_done() {
            return Ok(());
        }

        let partials = self.ctx.layout.partial_dirs();
        if partials.is_empty() {
            debug!("Run {}: no partial demultiplexing output yet", self.ctx.id);
            return Ok(());
        }

        let pending: Vec<usize> = partials
            .iter()
            .filter(|(_, dir)| !is_output_done(dir))
            .map(|(n, _)| *n)
            .collect();
        if !pending.is_empty() {
            debug!(
                "Run {}: partial demultiplexing {:?} still running (waiting for {})",
                self.ctx.id, pending, DEMUX_DONE
            );
            return Ok(());
        }

        self.aggregate(&partials)
    }

    fn compute_undetermined(&self) -> Result<bool, RunError> {
        let sheet = SampleSheet::read(&self.ctx.samplesheet_path())?;
        let lanes = sheet.no_index_lanes();
        if lanes.is_empty() {
            return Ok(true);
        }

        let Some(command) = self.ctx.family.undetermined_command.as_ref() else {
            error!(
                "Run {} has NoIndex lanes {:?} but no undetermined_command is configured",
                self.ctx.id, lanes
            );
            return Ok(false);
        };

        for lane in lanes {
            let output = self.undetermined_output(lane);
            if output.is_file() {
                debug!("Run {}: undetermined for lane {} already computed", self.ctx.id, lane);
                continue;
            }

            let args = vec![
                self.path().display().to_string(),
                lane.to_string(),
                output.display().to_string(),
            ];
            let outcome = run_to_completion(command, &args)?;
            if !outcome.success || !output.is_file() {
                error!(
                    "Run {}: undetermined computation for lane {} failed ({:?}): {}",
                    self.ctx.id, lane, outcome.exit_code, outcome.stderr_tail
                );
                return Ok(false);
            }
            info!("Run {}: undetermined indices computed for lane {}", self.ctx.id, lane);
        }
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
