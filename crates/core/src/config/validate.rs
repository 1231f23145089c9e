use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - At least one data directory is configured
/// - The analysis server host is not empty
/// - QC thresholds are within range
/// - The status database URL is set when the status database is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.analysis.data_dirs.is_empty() {
        return Err(ConfigError::ValidationError(
            "analysis.data_dirs cannot be empty".to_string(),
        ));
    }

    if config.analysis_server.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "analysis_server.host cannot be empty".to_string(),
        ));
    }

    let families = [
        ("hiseqx", &config.analysis.hiseqx),
        ("hiseq", &config.analysis.hiseq),
        ("miseq", &config.analysis.miseq),
        ("nextseq", &config.analysis.nextseq),
    ];
    for (name, family) in families {
        if let Some(family) = family {
            let pct = family.qc.max_undetermined_pct;
            if !(0.0..=100.0).contains(&pct) {
                return Err(ConfigError::ValidationError(format!(
                    "analysis.{}.qc.max_undetermined_pct must be between 0 and 100, got {}",
                    name, pct
                )));
            }
        }
    }

    if let Some(statusdb) = &config.statusdb {
        if statusdb.enabled && statusdb.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "statusdb.url cannot be empty when the status database is enabled".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, FamilyConfig, StatusDbConfig};

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[analysis]
data_dirs = ["/data/a"]
status_dir = "/data/status"

[analysis_server]
host = "analysis.example.org"
data_archive = "/proj/incoming"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_data_dirs_fails() {
        let mut config = valid_config();
        config.analysis.data_dirs.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_blank_host_fails() {
        let mut config = valid_config();
        config.analysis_server.host = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_undetermined_pct_out_of_range() {
        let mut config = valid_config();
        let mut family = FamilyConfig::default();
        family.qc.max_undetermined_pct = 150.0;
        config.analysis.hiseq = Some(family);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("analysis.hiseq.qc"));
    }

    #[test]
    fn test_validate_enabled_statusdb_requires_url() {
        let mut config = valid_config();
        config.statusdb = Some(StatusDbConfig {
            url: String::new(),
            username: None,
            password: None,
            database: "x_flowcells".to_string(),
            timeout_secs: 30,
            enabled: true,
        });
        assert!(validate_config(&config).is_err());

        if let Some(statusdb) = config.statusdb.as_mut() {
            statusdb.enabled = false;
        }
        assert!(validate_config(&config).is_ok());
    }
}
