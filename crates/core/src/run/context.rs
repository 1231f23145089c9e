//! State shared by all Illumina run handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::RunError;
use super::layout::RunLayout;
use super::qc;
use super::stats::DemuxStats;
use super::types::{QcReport, RunId, RunRecord};
use crate::config::{Config, FamilyConfig};
use crate::sequencer::{read_application_name, SequencerType};

#[derive(Debug, Clone)]
pub struct RunContext {
    pub id: RunId,
    pub layout: RunLayout,
    pub sequencer: SequencerType,
    pub family: FamilyConfig,
    pub config: Arc<Config>,
}

impl RunContext {
    pub fn new(run_dir: &Path, sequencer: SequencerType, config: Arc<Config>) -> Self {
        let family = config.analysis.family(sequencer).cloned().unwrap_or_else(|| {
            debug!(
                "No [analysis] settings for {}, using defaults for run {}",
                sequencer,
                run_dir.display()
            );
            FamilyConfig::default()
        });

        Self {
            id: RunId::from_path(run_dir),
            layout: RunLayout::new(run_dir),
            sequencer,
            family,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        self.layout.root()
    }

    pub fn samplesheet_path(&self) -> PathBuf {
        self.path().join(&self.family.samplesheet)
    }

    /// bcl2fastq arguments writing into `output_dir`. `lanes` restricts the
    /// conversion to those lanes; empty converts all of them.
    pub fn bcl2fastq_args(&self, output_dir: &Path, samplesheet: &Path, lanes: &[u32]) -> Vec<String> {
        let mut args = vec![
            "--runfolder-dir".to_string(),
            self.path().display().to_string(),
            "--output-dir".to_string(),
            output_dir.display().to_string(),
            "--sample-sheet".to_string(),
            samplesheet.display().to_string(),
        ];
        if !lanes.is_empty() {
            let tiles: Vec<String> = lanes.iter().map(|lane| format!("s_{}", lane)).collect();
            args.push("--tiles".to_string());
            args.push(tiles.join(","));
        }
        args.extend(self.family.bcl2fastq_options.iter().cloned());
        args
    }

    pub fn evaluate_qc(&self) -> Result<QcReport, RunError> {
        let stats = DemuxStats::read(&self.layout.stats_json())?;
        Ok(qc::evaluate(&self.id.id, &stats, &self.family.qc))
    }

    /// Status database document. Lane metrics are included once
    /// demultiplexing statistics exist.
    pub fn run_record(&self) -> Result<RunRecord, RunError> {
        let application_name = match read_application_name(self.path()) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!("Run {}: {}", self.id, e);
                None
            }
        };

        let stats_path = self.layout.stats_json();
        let lanes = if stats_path.is_file() {
            self.evaluate_qc()?.lanes
        } else {
            Vec::new()
        };

        Ok(RunRecord {
            run_id: self.id.clone(),
            sequencer_type: self.sequencer,
            application_name,
            lanes,
            qc_passed: None,
        })
    }
}
