use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument family a run was produced by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SequencerType {
    HiSeqX,
    HiSeq,
    MiSeq,
    NextSeq,
    Unknown,
}

/// Application name substrings, checked in order. The HiSeq X entry must
/// precede the generic HiSeq one.
const APPLICATION_NAMES: &[(&str, SequencerType)] = &[
    ("HiSeq X", SequencerType::HiSeqX),
    ("MiSeq", SequencerType::MiSeq),
    ("HiSeq", SequencerType::HiSeq),
    ("NextSeq Control Software", SequencerType::NextSeq),
];

impl SequencerType {
    /// Classifies an application name by case-sensitive substring match.
    pub fn from_application_name(name: &str) -> Self {
        APPLICATION_NAMES
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(_, sequencer)| *sequencer)
            .unwrap_or(SequencerType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SequencerType::HiSeqX => "HiSeqX",
            SequencerType::HiSeq => "HiSeq",
            SequencerType::MiSeq => "MiSeq",
            SequencerType::NextSeq => "NextSeq",
            SequencerType::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SequencerType::Unknown)
    }
}

impl fmt::Display for SequencerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hiseq_x_wins_over_generic_hiseq() {
        assert_eq!(
            SequencerType::from_application_name("HiSeq X Control Software"),
            SequencerType::HiSeqX
        );
        assert_eq!(
            SequencerType::from_application_name("HiSeq Control Software"),
            SequencerType::HiSeq
        );
    }

    #[test]
    fn test_miseq_and_nextseq() {
        assert_eq!(
            SequencerType::from_application_name("MiSeq Control Software"),
            SequencerType::MiSeq
        );
        assert_eq!(
            SequencerType::from_application_name("NextSeq Control Software"),
            SequencerType::NextSeq
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert_eq!(
            SequencerType::from_application_name("hiseq x control software"),
            SequencerType::Unknown
        );
    }

    #[test]
    fn test_unrecognised_name() {
        assert_eq!(
            SequencerType::from_application_name("NovaSeq Control Software"),
            SequencerType::Unknown
        );
        assert!(!SequencerType::Unknown.is_known());
        assert!(SequencerType::NextSeq.is_known());
    }

    #[test]
    fn test_display() {
        assert_eq!(SequencerType::HiSeqX.to_string(), "HiSeqX");
        assert_eq!(SequencerType::Unknown.to_string(), "Unknown");
    }
}
