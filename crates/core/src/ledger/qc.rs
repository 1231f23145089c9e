//! QC ledger (`qc.tsv`).

use chrono::Utc;
use std::path::{Path, PathBuf};

use super::lock::{read_ledger, LockedLedger};
use super::LedgerError;
use crate::run::QcReport;

const PASSED: &str = "PASSED";
const FAILED: &str = "FAILED";

/// One evaluation recorded in the QC ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct QcLedgerEntry {
    pub run_id: String,
    pub passed: bool,
    pub evaluated_at: String,
    pub metrics: String,
}

/// Audit trail of QC evaluations, independent of the transfer ledger.
///
/// Line format: `run_id<TAB>PASSED|FAILED<TAB>timestamp<TAB>lane metrics`,
/// lane metrics as `L<lane>:pf=<clusters>,undetermined=<pct>%` separated by `;`.
#[derive(Debug, Clone)]
pub struct QcLedger {
    path: PathBuf,
}

impl QcLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends an evaluation. Every evaluation is kept, including repeats.
    pub fn record(&self, report: &QcReport) -> Result<(), LedgerError> {
        let line = format!(
            "{}\t{}\t{}\t{}",
            report.run_id,
            if report.passed { PASSED } else { FAILED },
            Utc::now().to_rfc3339(),
            format_metrics(report)
        );

        let mut ledger = LockedLedger::open(&self.path)?;
        let existing = ledger.contents()?;
        ledger.append_line(&existing, &line)
    }

    /// Most recent recorded outcome for a run, `None` if it was never evaluated.
    pub fn last_result(&self, run_id: &str) -> Result<Option<bool>, LedgerError> {
        Ok(self
            .entries()?
            .into_iter()
            .rev()
            .find(|entry| entry.run_id == run_id)
            .map(|entry| entry.passed))
    }

    pub fn entries(&self) -> Result<Vec<QcLedgerEntry>, LedgerError> {
        let contents = read_ledger(&self.path)?;
        Ok(contents.lines().filter_map(parse_line).collect())
    }
}

fn format_metrics(report: &QcReport) -> String {
    report
        .lanes
        .iter()
        .map(|lane| {
            format!(
                "L{}:pf={},undetermined={:.2}%",
                lane.lane, lane.clusters_pf, lane.undetermined_pct
            )
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn parse_line(line: &str) -> Option<QcLedgerEntry> {
    let mut fields = line.split('\t');
    let run_id = fields.next()?.trim();
    let passed = match fields.next()?.trim() {
        PASSED => true,
        FAILED => false,
        _ => return None,
    };
    if run_id.is_empty() {
        return None;
    }
    Some(QcLedgerEntry {
        run_id: run_id.to_string(),
        passed,
        evaluated_at: fields.next().unwrap_or_default().to_string(),
        metrics: fields.next().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::LaneQc;
    use tempfile::TempDir;

    fn report(run_id: &str, passed: bool) -> QcReport {
        QcReport {
            run_id: run_id.to_string(),
            passed,
            lanes: vec![LaneQc {
                lane: 1,
                clusters_pf: 400_000_000,
                undetermined_reads: 8_000_000,
                undetermined_pct: 2.0,
                yield_bases: 120_000_000_000,
                passed,
            }],
            failures: vec![],
        }
    }

    #[test]
    fn test_never_evaluated() {
        let dir = TempDir::new().unwrap();
        let ledger = QcLedger::new(dir.path().join("qc.tsv"));
        assert_eq!(ledger.last_result("run").unwrap(), None);
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = TempDir::new().unwrap();
        let ledger = QcLedger::new(dir.path().join("qc.tsv"));
        ledger.record(&report("run_a", false)).unwrap();

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].run_id, "run_a");
        assert!(!entries[0].passed);
        assert_eq!(entries[0].metrics, "L1:pf=400000000,undetermined=2.00%");
    }

    #[test]
    fn test_last_result_wins() {
        let dir = TempDir::new().unwrap();
        let ledger = QcLedger::new(dir.path().join("qc.tsv"));
        ledger.record(&report("run_a", false)).unwrap();
        ledger.record(&report("run_b", false)).unwrap();
        ledger.record(&report("run_a", true)).unwrap();

        assert_eq!(ledger.last_result("run_a").unwrap(), Some(true));
        assert_eq!(ledger.last_result("run_b").unwrap(), Some(false));
        assert_eq!(ledger.entries().unwrap().len(), 3);
    }
}
