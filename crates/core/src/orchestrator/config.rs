//! Orchestrator configuration.

use std::path::PathBuf;

use crate::config::{ArchiveDirs, Config};

/// Settings the run orchestrator needs, taken from [`Config`] at startup.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Roots scanned in batch mode.
    pub data_dirs: Vec<PathBuf>,
    /// `transfer.tsv`.
    pub transfer_ledger: PathBuf,
    /// `qc.tsv`.
    pub qc_ledger: PathBuf,
    /// Transfer runs that failed QC.
    pub force_transfer: bool,
    /// Ask the analysis server to start analysis after transfer.
    pub start_analysis: bool,
    /// Where transferred runs are moved, per instrument family.
    pub archive_dirs: ArchiveDirs,
    /// Referenced in QC failure notices.
    pub log_file: Option<PathBuf>,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_dirs: config.analysis.data_dirs.clone(),
            transfer_ledger: config.analysis.transfer_ledger_path(),
            qc_ledger: config.analysis.qc_ledger_path(),
            force_transfer: config.analysis.force_transfer,
            start_analysis: config.analysis.start_analysis,
            archive_dirs: config.storage.archive_dirs.clone(),
            log_file: config.log.file.clone(),
        }
    }

    /// Per invocation override of the force-transfer policy.
    pub fn with_force_transfer(mut self, force: bool) -> Self {
        self.force_transfer = force;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::sequencer::SequencerType;
    use std::path::Path;

    const MINIMAL: &str = r#"
[analysis]
data_dirs = ["/data/a", "/data/b"]
status_dir = "/status"

[analysis_server]
host = "analysis.example.org"
data_archive = "/proj/incoming"
"#;

    #[test]
    fn test_defaults_from_config() {
        let config = OrchestratorConfig::from_config(&load_config_from_str(MINIMAL).unwrap());
        assert_eq!(config.data_dirs.len(), 2);
        assert_eq!(config.transfer_ledger, PathBuf::from("/status/transfer.tsv"));
        assert_eq!(config.qc_ledger, PathBuf::from("/status/qc.tsv"));
        assert!(config.force_transfer);
        assert!(!config.start_analysis);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_explicit_policy_and_override() {
        let toml = MINIMAL.replace(
            "status_dir = \"/status\"",
            "status_dir = \"/status\"\nforce_transfer = false\nstart_analysis = true\n\n[storage.archive_dirs]\nhiseqx = \"/data/a/nosync\"",
        );
        let config = OrchestratorConfig::from_config(&load_config_from_str(&toml).unwrap());
        assert!(!config.force_transfer);
        assert!(config.start_analysis);
        assert_eq!(
            config.archive_dirs.for_sequencer(SequencerType::HiSeqX),
            Some(Path::new("/data/a/nosync"))
        );

        assert!(config.with_force_transfer(true).force_transfer);
    }
}
