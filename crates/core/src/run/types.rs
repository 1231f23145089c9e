//! Run data types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::sequencer::SequencerType;

/// Identity of a run, derived from its directory name.
///
/// Illumina names follow `<YYMMDD>_<instrument>_<number>_<position><flowcell>`,
/// e.g. `150101_X_0001_AHXXXXXX`. MiSeq flowcells look like
/// `000000000-AB1CD` and carry no position letter. Names that do not follow
/// the convention keep only `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunId {
    pub id: String,
    pub date: Option<String>,
    pub instrument: Option<String>,
    pub number: Option<String>,
    pub position: Option<char>,
    pub flowcell: Option<String>,
}

impl RunId {
    pub fn parse(name: &str) -> Self {
        let unparsed = Self {
            id: name.to_string(),
            date: None,
            instrument: None,
            number: None,
            position: None,
            flowcell: None,
        };

        let parts: Vec<&str> = name.splitn(4, '_').collect();
        let [date, instrument, number, tail] = parts[..] else {
            return unparsed;
        };
        let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
        if date.len() != 6 || !is_digits(date) || !is_digits(number) || tail.is_empty() {
            return unparsed;
        }

        let (position, flowcell) = match tail.chars().next() {
            Some(p @ ('A' | 'B')) if tail.len() > 1 && !tail.starts_with("000000000-") => {
                (Some(p), tail[1..].to_string())
            }
            _ => (None, tail.to_string()),
        };

        Self {
            id: name.to_string(),
            date: Some(date.to_string()),
            instrument: Some(instrument.to_string()),
            number: Some(number.to_string()),
            position,
            flowcell: Some(flowcell),
        }
    }

    /// Derives the identity from the last component of a run directory path.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(&name)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Processing stage, derived from on-disk markers on every call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// The instrument is still writing data.
    Sequencing,
    /// Sequencing finished, demultiplexing not started.
    ToStart,
    /// Demultiplexing running or partially finished.
    InProgress,
    /// All conversion output present.
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Sequencing => "SEQUENCING",
            RunStatus::ToStart => "TO_START",
            RunStatus::InProgress => "IN_PROGRESS",
            RunStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// QC metrics of one lane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaneQc {
    pub lane: u32,
    pub clusters_pf: u64,
    pub undetermined_reads: u64,
    pub undetermined_pct: f64,
    pub yield_bases: u64,
    pub passed: bool,
}

/// Outcome of evaluating a run against its QC thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QcReport {
    pub run_id: String,
    pub passed: bool,
    pub lanes: Vec<LaneQc>,
    /// Human readable reasons, one per failed check.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl QcReport {
    pub fn failed_lanes(&self) -> impl Iterator<Item = &LaneQc> {
        self.lanes.iter().filter(|lane| !lane.passed)
    }
}

/// Document describing a run in the status database.
///
/// Contains no timestamps so repeated uploads of an unchanged run produce
/// identical content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: RunId,
    pub sequencer_type: SequencerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    #[serde(default)]
    pub lanes: Vec<LaneQc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_passed: Option<bool>,
}

/// Result of a dispatched transfer.
///
/// A report exists whenever the copy was attempted, even if it failed; an
/// error from `transfer` means nothing was dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferReport {
    pub run_id: String,
    pub destination: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<PathBuf>,
    pub analysis_started: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hiseq_x_run() {
        let id = RunId::parse("150101_X_0001_AHXXXXXX");
        assert_eq!(id.id, "150101_X_0001_AHXXXXXX");
        assert_eq!(id.date.as_deref(), Some("150101"));
        assert_eq!(id.instrument.as_deref(), Some("X"));
        assert_eq!(id.number.as_deref(), Some("0001"));
        assert_eq!(id.position, Some('A'));
        assert_eq!(id.flowcell.as_deref(), Some("HXXXXXX"));
    }

    #[test]
    fn test_parse_miseq_run() {
        let id = RunId::parse("150101_M01320_0042_000000000-AB1CD");
        assert_eq!(id.instrument.as_deref(), Some("M01320"));
        assert_eq!(id.position, None);
        assert_eq!(id.flowcell.as_deref(), Some("000000000-AB1CD"));
    }

    #[test]
    fn test_parse_unconventional_name() {
        let id = RunId::parse("my_run");
        assert_eq!(id.id, "my_run");
        assert!(id.date.is_none());
        assert!(id.flowcell.is_none());

        let id = RunId::parse("15010_X_0001_AHXXXXXX");
        assert!(id.flowcell.is_none());
    }

    #[test]
    fn test_from_path_uses_last_component() {
        let id = RunId::from_path(Path::new("/data/hiseq/150101_X_0001_BHXXXXXX"));
        assert_eq!(id.to_string(), "150101_X_0001_BHXXXXXX");
        assert_eq!(id.position, Some('B'));
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::ToStart.to_string(), "TO_START");
        assert_eq!(
            serde_json::to_string(&RunStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn test_failed_lanes() {
        let lane = |lane, passed| LaneQc {
            lane,
            clusters_pf: 1,
            undetermined_reads: 0,
            undetermined_pct: 0.0,
            yield_bases: 1,
            passed,
        };
        let report = QcReport {
            run_id: "run".to_string(),
            passed: false,
            lanes: vec![lane(1, true), lane(2, false)],
            failures: vec!["lane 2".to_string()],
        };
        let failed: Vec<u32> = report.failed_lanes().map(|l| l.lane).collect();
        assert_eq!(failed, vec![2]);
    }
}
