use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sequencer::SequencerType;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub analysis_server: AnalysisServerConfig,
    #[serde(default)]
    pub statusdb: Option<StatusDbConfig>,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Where runs are found and how each instrument family is processed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Roots the instruments write run directories into.
    pub data_dirs: Vec<PathBuf>,
    /// Holds `transfer.tsv`, `qc.tsv` and the pending status-DB uploads.
    pub status_dir: PathBuf,
    /// Transfer policy for runs that fail QC.
    ///
    /// When `true` (the default) a failing run is still recorded and notified,
    /// then transferred anyway. When `false` the transfer is deferred and the
    /// run is re-evaluated on every later invocation.
    #[serde(default = "default_force_transfer")]
    pub force_transfer: bool,
    /// Ask the analysis server to start analysis once a run is transferred.
    #[serde(default)]
    pub start_analysis: bool,
    #[serde(default)]
    pub hiseqx: Option<FamilyConfig>,
    #[serde(default)]
    pub hiseq: Option<FamilyConfig>,
    #[serde(default)]
    pub miseq: Option<FamilyConfig>,
    #[serde(default)]
    pub nextseq: Option<FamilyConfig>,
}

fn default_force_transfer() -> bool {
    true
}

impl AnalysisConfig {
    /// Settings for an instrument family, if configured.
    pub fn family(&self, sequencer: SequencerType) -> Option<&FamilyConfig> {
        match sequencer {
            SequencerType::HiSeqX => self.hiseqx.as_ref(),
            SequencerType::HiSeq => self.hiseq.as_ref(),
            SequencerType::MiSeq => self.miseq.as_ref(),
            SequencerType::NextSeq => self.nextseq.as_ref(),
            SequencerType::Unknown => None,
        }
    }

    pub fn transfer_ledger_path(&self) -> PathBuf {
        self.status_dir.join("transfer.tsv")
    }

    pub fn qc_ledger_path(&self) -> PathBuf {
        self.status_dir.join("qc.tsv")
    }

    pub fn statusdb_pending_dir(&self) -> PathBuf {
        self.status_dir.join("statusdb_pending")
    }
}

/// Per instrument family demultiplexing and QC settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FamilyConfig {
    /// bcl2fastq executable.
    #[serde(default = "default_bcl2fastq")]
    pub bcl2fastq: PathBuf,
    /// Extra arguments passed to every bcl2fastq invocation.
    #[serde(default)]
    pub bcl2fastq_options: Vec<String>,
    /// Sample sheet file name inside the run directory.
    #[serde(default = "default_samplesheet")]
    pub samplesheet: String,
    /// Helper computing undetermined indices for a NoIndex lane.
    /// Invoked as `<command> <run_dir> <lane> <output>`.
    #[serde(default)]
    pub undetermined_command: Option<PathBuf>,
    #[serde(default)]
    pub qc: QcThresholds,
}

fn default_bcl2fastq() -> PathBuf {
    PathBuf::from("bcl2fastq")
}

fn default_samplesheet() -> String {
    "SampleSheet.csv".to_string()
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            bcl2fastq: default_bcl2fastq(),
            bcl2fastq_options: Vec::new(),
            samplesheet: default_samplesheet(),
            undetermined_command: None,
            qc: QcThresholds::default(),
        }
    }
}

/// Per lane QC thresholds.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct QcThresholds {
    /// Minimum number of clusters passing filter in a lane.
    #[serde(default)]
    pub min_clusters_per_lane: u64,
    /// Maximum share of undetermined reads in a lane, in percent.
    #[serde(default = "default_max_undetermined_pct")]
    pub max_undetermined_pct: f64,
}

fn default_max_undetermined_pct() -> f64 {
    100.0
}

impl Default for QcThresholds {
    fn default() -> Self {
        Self {
            min_clusters_per_lane: 0,
            max_undetermined_pct: default_max_undetermined_pct(),
        }
    }
}

/// Local archive roots, one per instrument family.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub archive_dirs: ArchiveDirs,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArchiveDirs {
    #[serde(default)]
    pub hiseqx: Option<PathBuf>,
    #[serde(default)]
    pub hiseq: Option<PathBuf>,
    #[serde(default)]
    pub miseq: Option<PathBuf>,
    #[serde(default)]
    pub nextseq: Option<PathBuf>,
}

impl ArchiveDirs {
    pub fn for_sequencer(&self, sequencer: SequencerType) -> Option<&Path> {
        match sequencer {
            SequencerType::HiSeqX => self.hiseqx.as_deref(),
            SequencerType::HiSeq => self.hiseq.as_deref(),
            SequencerType::MiSeq => self.miseq.as_deref(),
            SequencerType::NextSeq => self.nextseq.as_deref(),
            SequencerType::Unknown => None,
        }
    }
}

/// Remote analysis server receiving transferred runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisServerConfig {
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    /// Port of the analysis trigger HTTP endpoint.
    #[serde(default = "default_analysis_port")]
    pub port: u16,
    /// Remote directory runs are synced into.
    pub data_archive: PathBuf,
    #[serde(default = "default_rsync")]
    pub rsync: PathBuf,
    #[serde(default = "default_rsync_options")]
    pub rsync_options: Vec<String>,
    /// Patterns passed to rsync as `--exclude=<pattern>`.
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Request timeout for the analysis trigger in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_analysis_port() -> u16 {
    8080
}

fn default_rsync() -> PathBuf {
    PathBuf::from("rsync")
}

fn default_rsync_options() -> Vec<String> {
    ["-Lav", "--no-o", "--no-g", "--chmod=g+rw"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout() -> u64 {
    30
}

impl AnalysisServerConfig {
    /// rsync destination, `user@host:data_archive` or `host:data_archive`.
    pub fn rsync_destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}:{}", user, self.host, self.data_archive.display()),
            None => format!("{}:{}", self.host, self.data_archive.display()),
        }
    }
}

/// CouchDB status database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusDbConfig {
    /// Server URL (e.g., "http://localhost:5984")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_database() -> String {
    "x_flowcells".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Operator notifications.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default)]
    pub recipients: Vec<String>,
    /// sendmail-compatible command reading the message on stdin.
    #[serde(default = "default_mail_command")]
    pub command: PathBuf,
}

fn default_mail_command() -> PathBuf {
    PathBuf::from("sendmail")
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            command: default_mail_command(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub analysis: AnalysisConfig,
    pub storage: StorageConfig,
    pub analysis_server: AnalysisServerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statusdb: Option<SanitizedStatusDbConfig>,
    pub mail: MailConfig,
    pub log: LogConfig,
}

/// Sanitized status database config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStatusDbConfig {
    pub url: String,
    pub username: Option<String>,
    pub password_configured: bool,
    pub database: String,
    pub timeout_secs: u64,
    pub enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            analysis: config.analysis.clone(),
            storage: config.storage.clone(),
            analysis_server: config.analysis_server.clone(),
            statusdb: config.statusdb.as_ref().map(|s| SanitizedStatusDbConfig {
                url: s.url.clone(),
                username: s.username.clone(),
                password_configured: s.password.as_ref().is_some_and(|p| !p.is_empty()),
                database: s.database.clone(),
                timeout_secs: s.timeout_secs,
                enabled: s.enabled,
            }),
            mail: config.mail.clone(),
            log: config.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[analysis]
data_dirs = ["/srv/illumina/hiseq_data"]
status_dir = "/srv/illumina/status"

[analysis_server]
host = "analysis.example.org"
data_archive = "/proj/incoming"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.analysis.data_dirs.len(), 1);
        assert!(config.analysis.force_transfer);
        assert!(!config.analysis.start_analysis);
        assert!(config.analysis.hiseqx.is_none());
        assert!(config.statusdb.is_none());
        assert!(config.mail.recipients.is_empty());
        assert_eq!(config.mail.command, PathBuf::from("sendmail"));
        assert_eq!(config.analysis_server.port, 8080);
        assert_eq!(config.analysis_server.rsync, PathBuf::from("rsync"));
        assert_eq!(config.analysis_server.rsync_options[0], "-Lav");
    }

    #[test]
    fn test_ledger_paths_live_in_status_dir() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.analysis.transfer_ledger_path(),
            PathBuf::from("/srv/illumina/status/transfer.tsv")
        );
        assert_eq!(
            config.analysis.qc_ledger_path(),
            PathBuf::from("/srv/illumina/status/qc.tsv")
        );
    }

    #[test]
    fn test_deserialize_family_settings() {
        let toml = format!(
            "{}{}",
            MINIMAL,
            r#"
[analysis.hiseqx]
bcl2fastq = "/opt/bcl2fastq/bin/bcl2fastq"
bcl2fastq_options = ["--barcode-mismatches", "0"]

[analysis.hiseqx.qc]
min_clusters_per_lane = 320000000
max_undetermined_pct = 5.0

[storage.archive_dirs]
hiseqx = "/srv/illumina/nosync"
"#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let family = config.analysis.family(SequencerType::HiSeqX).unwrap();
        assert_eq!(family.bcl2fastq, PathBuf::from("/opt/bcl2fastq/bin/bcl2fastq"));
        assert_eq!(family.samplesheet, "SampleSheet.csv");
        assert_eq!(family.qc.min_clusters_per_lane, 320_000_000);
        assert_eq!(family.qc.max_undetermined_pct, 5.0);
        assert!(config.analysis.family(SequencerType::HiSeq).is_none());
        assert!(config.analysis.family(SequencerType::Unknown).is_none());
        assert_eq!(
            config.storage.archive_dirs.for_sequencer(SequencerType::HiSeqX),
            Some(Path::new("/srv/illumina/nosync"))
        );
    }

    #[test]
    fn test_deserialize_missing_analysis_fails() {
        let toml = r#"
[analysis_server]
host = "analysis.example.org"
data_archive = "/proj/incoming"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_rsync_destination() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(
            config.analysis_server.rsync_destination(),
            "analysis.example.org:/proj/incoming"
        );
        config.analysis_server.user = Some("funk".to_string());
        assert_eq!(
            config.analysis_server.rsync_destination(),
            "funk@analysis.example.org:/proj/incoming"
        );
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let toml = format!(
            "{}{}",
            MINIMAL,
            r#"
[statusdb]
url = "http://couch.example.org:5984"
username = "runflow"
password = "secret"
"#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        let statusdb = sanitized.statusdb.as_ref().unwrap();
        assert!(statusdb.password_configured);
        assert_eq!(statusdb.database, "x_flowcells");
        assert!(statusdb.enabled);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
