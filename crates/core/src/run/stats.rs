//! bcl2fastq `Stats/Stats.json` reader.
//!
//! Only the fields QC needs are typed; everything else is carried through
//! untouched so merged documents stay complete.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use super::error::RunError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DemuxStats {
    #[serde(default)]
    pub flowcell: Option<String>,
    #[serde(default)]
    pub conversion_results: Vec<LaneConversion>,
    #[serde(default)]
    pub unknown_barcodes: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LaneConversion {
    pub lane_number: u32,
    #[serde(default)]
    pub total_clusters_raw: u64,
    #[serde(rename = "TotalClustersPF", default)]
    pub total_clusters_pf: u64,
    #[serde(default)]
    pub r#yield: u64,
    #[serde(default)]
    pub demux_results: Vec<Value>,
    #[serde(default)]
    pub undetermined: Option<UndeterminedReads>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UndeterminedReads {
    #[serde(default)]
    pub number_reads: u64,
    #[serde(default)]
    pub r#yield: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DemuxStats {
    pub fn read(path: &Path) -> Result<Self, RunError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::stats(path, "file not found")
            } else {
                RunError::io(path, e)
            }
        })?;
        serde_json::from_str(&contents).map_err(|e| RunError::stats(path, e.to_string()))
    }

    pub fn write(&self, path: &Path) -> Result<(), RunError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| RunError::stats(path, e.to_string()))?;
        std::fs::write(path, json).map_err(|e| RunError::io(path, e))
    }

    /// Combines partial results covering disjoint lane sets. When a lane
    /// appears twice the first occurrence is kept.
    pub fn merge(parts: impl IntoIterator<Item = DemuxStats>) -> DemuxStats {
        let mut merged = DemuxStats::default();
        for part in parts {
            if merged.flowcell.is_none() {
                merged.flowcell = part.flowcell;
            }
            for (key, value) in part.extra {
                merged.extra.entry(key).or_insert(value);
            }
            for lane in part.conversion_results {
                if !merged
                    .conversion_results
                    .iter()
                    .any(|l| l.lane_number == lane.lane_number)
                {
                    merged.conversion_results.push(lane);
                }
            }
            merged.unknown_barcodes.extend(part.unknown_barcodes);
        }
        merged.conversion_results.sort_by_key(|l| l.lane_number);
        merged
    }
}

impl LaneConversion {
    pub fn undetermined_reads(&self) -> u64 {
        self.undetermined.as_ref().map_or(0, |u| u.number_reads)
    }

    /// Share of PF clusters that matched no sample, in percent.
    pub fn undetermined_pct(&self) -> f64 {
        if self.total_clusters_pf == 0 {
            return 0.0;
        }
        self.undetermined_reads() as f64 * 100.0 / self.total_clusters_pf as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STATS: &str = r#"{
  "Flowcell": "HXXXXXX",
  "RunNumber": 1,
  "RunId": "150101_X_0001_AHXXXXXX",
  "ConversionResults": [
    {
      "LaneNumber": 2,
      "TotalClustersRaw": 500,
      "TotalClustersPF": 400,
      "Yield": 120000,
      "DemuxResults": [{"SampleId": "P1_101", "NumberReads": 390}],
      "Undetermined": {"NumberReads": 10, "Yield": 3000}
    }
  ],
  "UnknownBarcodes": []
}"#;

    #[test]
    fn test_parse_stats() {
        let stats: DemuxStats = serde_json::from_str(STATS).unwrap();
        assert_eq!(stats.flowcell.as_deref(), Some("HXXXXXX"));
        let lane = &stats.conversion_results[0];
        assert_eq!(lane.lane_number, 2);
        assert_eq!(lane.total_clusters_pf, 400);
        assert_eq!(lane.undetermined_reads(), 10);
        assert!((lane.undetermined_pct() - 2.5).abs() < 1e-9);
        assert_eq!(stats.extra.get("RunNumber"), Some(&Value::from(1)));
    }

    #[test]
    fn test_zero_pf_lane() {
        let lane = LaneConversion {
            lane_number: 1,
            ..Default::default()
        };
        assert_eq!(lane.undetermined_pct(), 0.0);
    }

    #[test]
    fn test_merge_orders_lanes() {
        let part_a: DemuxStats = serde_json::from_str(STATS).unwrap();
        let part_b = DemuxStats {
            conversion_results: vec![LaneConversion {
                lane_number: 1,
                total_clusters_pf: 10,
                ..Default::default()
            }],
            ..Default::default()
        };

        let merged = DemuxStats::merge([part_a, part_b]);
        let lanes: Vec<u32> = merged
            .conversion_results
            .iter()
            .map(|l| l.lane_number)
            .collect();
        assert_eq!(lanes, vec![1, 2]);
        assert_eq!(merged.flowcell.as_deref(), Some("HXXXXXX"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Stats.json");
        let stats: DemuxStats = serde_json::from_str(STATS).unwrap();
        stats.write(&path).unwrap();
        assert_eq!(DemuxStats::read(&path).unwrap(), stats);
    }

    #[test]
    fn test_missing_stats() {
        let dir = TempDir::new().unwrap();
        let err = DemuxStats::read(&dir.path().join("Stats.json")).unwrap_err();
        assert!(matches!(err, RunError::Stats { .. }));
    }
}
