//! Minimal Illumina sample sheet reader.
//!
//! Supports the sectioned format (`[Header]`, `[Reads]`, `[Data]`, ...) and
//! the older flat CSV used by HiSeq control software, where dual indices are
//! written as `ACGTACGT-TTAGGCAA` in a single `Index` column.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::error::RunError;

/// One sample row of the data section.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub lane: Option<u32>,
    pub sample_id: String,
    pub index: String,
    pub index2: String,
    raw: String,
}

impl SampleRow {
    pub fn has_index(&self) -> bool {
        !self.index.is_empty()
    }

    fn index_lengths(&self) -> (usize, usize) {
        (self.index.len(), self.index2.len())
    }
}

/// Lanes demultiplexed together because their indices have the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneGroup {
    /// Index and index2 lengths shared by the lanes; `(0, 0)` for NoIndex lanes.
    pub index_lengths: (usize, usize),
    /// Lanes in the group. Empty when the sheet has no lane column.
    pub lanes: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct SampleSheet {
    path: PathBuf,
    /// Everything up to and including the column header line.
    preamble: Vec<String>,
    rows: Vec<SampleRow>,
}

impl SampleSheet {
    pub fn read(path: &Path) -> Result<Self, RunError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunError::sample_sheet(path, "file not found")
            } else {
                RunError::io(path, e)
            }
        })?;
        Self::parse(path, &contents)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, RunError> {
        let lines: Vec<&str> = contents.lines().collect();

        let data_start = lines
            .iter()
            .position(|line| section_name(line).is_some_and(|s| s.eq_ignore_ascii_case("data")));
        let header_idx = match data_start {
            Some(idx) => (idx + 1..lines.len())
                .find(|&i| !is_blank(lines[i]))
                .ok_or_else(|| RunError::sample_sheet(path, "empty [Data] section"))?,
            None if lines.iter().any(|line| section_name(line).is_some()) => {
                return Err(RunError::sample_sheet(path, "no [Data] section"));
            }
            None => (0..lines.len())
                .find(|&i| !is_blank(lines[i]))
                .ok_or_else(|| RunError::sample_sheet(path, "empty file"))?,
        };

        let columns: Vec<String> = lines[header_idx]
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let column = |names: &[&str]| columns.iter().position(|c| names.contains(&c.as_str()));

        let lane_col = column(&["lane"]);
        let sample_col = column(&["sample_id", "sampleid"])
            .ok_or_else(|| RunError::sample_sheet(path, "no Sample_ID column"))?;
        let index_col = column(&["index"]);
        let index2_col = column(&["index2"]);

        let mut rows = Vec::new();
        for line in &lines[header_idx + 1..] {
            if section_name(line).is_some() {
                break;
            }
            if is_blank(line) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let field = |idx: Option<usize>| {
                idx.and_then(|i| fields.get(i).copied())
                    .unwrap_or_default()
                    .to_string()
            };

            let lane = match lane_col.map(|i| field(Some(i))) {
                Some(lane) if !lane.is_empty() => Some(lane.parse::<u32>().map_err(|_| {
                    RunError::sample_sheet(path, format!("invalid lane {:?}", lane))
                })?),
                _ => None,
            };

            let mut index = field(index_col);
            let mut index2 = field(index2_col);
            if index2.is_empty() {
                if let Some((first, second)) = index.split_once('-') {
                    index2 = second.to_string();
                    index = first.to_string();
                }
            }
            if index.eq_ignore_ascii_case("noindex") {
                index.clear();
            }

            rows.push(SampleRow {
                lane,
                sample_id: field(Some(sample_col)),
                index,
                index2,
                raw: line.to_string(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            preamble: lines[..=header_idx].iter().map(|l| l.to_string()).collect(),
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn lanes(&self) -> BTreeSet<u32> {
        self.rows.iter().filter_map(|row| row.lane).collect()
    }

    /// Lanes none of whose samples carry an index.
    pub fn no_index_lanes(&self) -> Vec<u32> {
        self.lanes()
            .into_iter()
            .filter(|lane| {
                self.rows
                    .iter()
                    .filter(|row| row.lane == Some(*lane))
                    .all(|row| !row.has_index())
            })
            .collect()
    }

    /// Groups lanes by index shape. A lane's shape is the longest index found
    /// among its samples.
    pub fn lane_groups(&self) -> Vec<LaneGroup> {
        let lanes = self.lanes();
        if lanes.is_empty() {
            let index_lengths = self
                .rows
                .iter()
                .map(SampleRow::index_lengths)
                .max()
                .unwrap_or((0, 0));
            return vec![LaneGroup {
                index_lengths,
                lanes: Vec::new(),
            }];
        }

        let mut groups: BTreeMap<(usize, usize), Vec<u32>> = BTreeMap::new();
        for lane in lanes {
            let shape = self
                .rows
                .iter()
                .filter(|row| row.lane == Some(lane))
                .map(SampleRow::index_lengths)
                .max()
                .unwrap_or((0, 0));
            groups.entry(shape).or_default().push(lane);
        }

        groups
            .into_iter()
            .map(|(index_lengths, lanes)| LaneGroup {
                index_lengths,
                lanes,
            })
            .collect()
    }

    /// Sheet restricted to the given lanes. An empty slice keeps every row.
    pub fn subset(&self, lanes: &[u32]) -> String {
        let mut out: Vec<&str> = self.preamble.iter().map(String::as_str).collect();
        out.extend(
            self.rows
                .iter()
                .filter(|row| lanes.is_empty() || row.lane.is_some_and(|l| lanes.contains(&l)))
                .map(|row| row.raw.as_str()),
        );
        let mut text = out.join("\n");
        text.push('\n');
        text
    }
}

fn section_name(line: &str) -> Option<&str> {
    let first = line.split(',').next()?.trim();
    first.strip_prefix('[')?.strip_suffix(']')
}

fn is_blank(line: &str) -> bool {
    line.split(',').all(|field| field.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONED: &str = "\
[Header],,,
IEMFileVersion,4,,
[Reads],,,
151,,,
151,,,
[Data],,,
Lane,Sample_ID,Sample_Name,index,index2
1,P100_101,P100_101,ACGTACGT,TTAGGCAA
1,P100_102,P100_102,GGCCTTAA,CCAATTGG
2,P200_101,P200_101,ACGTAC,
3,P300_101,P300_101,,
,,,,
";

    const FLAT: &str = "\
FCID,Lane,SampleID,SampleRef,Index,Description,Control,Recipe,Operator,SampleProject
HXXXXXX,1,P1_101,hg19,ACGTACGT-TTAGGCAA,,N,,op,P1
HXXXXXX,2,P2_101,hg19,NoIndex,,N,,op,P2
";

    fn parse(contents: &str) -> SampleSheet {
        SampleSheet::parse(Path::new("SampleSheet.csv"), contents).unwrap()
    }

    #[test]
    fn test_parse_sectioned_sheet() {
        let sheet = parse(SECTIONED);
        assert_eq!(sheet.rows().len(), 4);
        assert_eq!(sheet.rows()[0].sample_id, "P100_101");
        assert_eq!(sheet.rows()[0].index2, "TTAGGCAA");
        assert_eq!(sheet.lanes().into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_no_index_lanes() {
        assert_eq!(parse(SECTIONED).no_index_lanes(), vec![3]);
        assert_eq!(parse(FLAT).no_index_lanes(), vec![2]);
    }

    #[test]
    fn test_flat_sheet_splits_dual_index() {
        let sheet = parse(FLAT);
        assert_eq!(sheet.rows()[0].index, "ACGTACGT");
        assert_eq!(sheet.rows()[0].index2, "TTAGGCAA");
        assert!(!sheet.rows()[1].has_index());
    }

    #[test]
    fn test_lane_groups_by_index_shape() {
        let groups = parse(SECTIONED).lane_groups();
        assert_eq!(
            groups,
            vec![
                LaneGroup {
                    index_lengths: (0, 0),
                    lanes: vec![3]
                },
                LaneGroup {
                    index_lengths: (6, 0),
                    lanes: vec![2]
                },
                LaneGroup {
                    index_lengths: (8, 8),
                    lanes: vec![1]
                },
            ]
        );
    }

    #[test]
    fn test_subset_keeps_preamble_and_lane_rows() {
        let subset = parse(SECTIONED).subset(&[2]);
        assert!(subset.starts_with("[Header],,,\n"));
        assert!(subset.contains("Lane,Sample_ID,Sample_Name,index,index2\n"));
        assert!(subset.contains("2,P200_101,P200_101,ACGTAC,\n"));
        assert!(!subset.contains("P100_101"));

        let resheet = parse(&subset);
        assert_eq!(resheet.rows().len(), 1);
    }

    #[test]
    fn test_sheet_without_lane_column() {
        let sheet = parse("[Data]\nSample_ID,index\nS1,ACGT\nS2,TTGG\n");
        assert!(sheet.lanes().is_empty());
        let groups = sheet.lane_groups();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].lanes.is_empty());
        assert_eq!(groups[0].index_lengths, (4, 0));
    }

    #[test]
    fn test_missing_data_section() {
        let result = SampleSheet::parse(Path::new("s.csv"), "[Header]\nfoo,bar\n");
        assert!(matches!(result, Err(RunError::SampleSheet { .. })));
    }

    #[test]
    fn test_invalid_lane() {
        let result = SampleSheet::parse(Path::new("s.csv"), "[Data]\nLane,Sample_ID\nx,S1\n");
        assert!(result.is_err());
    }
}
