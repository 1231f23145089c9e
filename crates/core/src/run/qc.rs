//! QC gate evaluation.

use super::stats::DemuxStats;
use super::types::{LaneQc, QcReport};
use crate::config::QcThresholds;

/// Checks every lane against the thresholds. A run without lanes fails.
pub fn evaluate(run_id: &str, stats: &DemuxStats, thresholds: &QcThresholds) -> QcReport {
    let mut failures = Vec::new();

    let lanes: Vec<LaneQc> = stats
        .conversion_results
        .iter()
        .map(|lane| {
            let undetermined_pct = lane.undetermined_pct();
            let mut passed = true;

            if lane.total_clusters_pf < thresholds.min_clusters_per_lane {
                passed = false;
                failures.push(format!(
                    "lane {}: {} clusters PF, minimum {}",
                    lane.lane_number, lane.total_clusters_pf, thresholds.min_clusters_per_lane
                ));
            }
            if undetermined_pct > thresholds.max_undetermined_pct {
                passed = false;
                failures.push(format!(
                    "lane {}: {:.2}% undetermined, maximum {:.2}%",
                    lane.lane_number, undetermined_pct, thresholds.max_undetermined_pct
                ));
            }

            LaneQc {
                lane: lane.lane_number,
                clusters_pf: lane.total_clusters_pf,
                undetermined_reads: lane.undetermined_reads(),
                undetermined_pct,
                yield_bases: lane.r#yield,
                passed,
            }
        })
        .collect();

    if lanes.is_empty() {
        failures.push("no lanes in demultiplexing stats".to_string());
    }

    QcReport {
        run_id: run_id.to_string(),
        passed: failures.is_empty(),
        lanes,
        failures,
    }
}
