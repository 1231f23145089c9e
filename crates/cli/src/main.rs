use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use runflow_core::{
    create_notifier, load_config, validate_config, Config, CouchStatusDb, IlluminaRunFactory,
    OrchestratorConfig, RunOrchestrator, SanitizedConfig, StatusDbSync,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "runflow")]
#[command(about = "Drives sequencing runs through demultiplexing, QC and transfer")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "RUNFLOW_CONFIG", default_value = "runflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process one run, or every run under the configured data directories
    Process {
        /// Run directory; all discovered runs when omitted
        #[arg(long)]
        run: Option<PathBuf>,

        /// Transfer runs that failed QC (overrides analysis.force_transfer)
        #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
        force_transfer: Option<bool>,
    },

    /// Transfer a run now, bypassing stage and QC checks
    Transfer {
        #[arg(long)]
        run: PathBuf,

        /// Ask the analysis server to start analysis afterwards
        #[arg(long)]
        analysis: bool,

        /// Transfer even if the run is already in the transfer ledger
        #[arg(long)]
        force: bool,
    },

    /// Push a run's record to the status database
    Upload {
        #[arg(long)]
        run: PathBuf,
    },

    /// Print the configuration with secrets redacted
    ShowConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            if let Err(log_err) = init_logging(None) {
                eprintln!("{:#}", log_err);
            }
            error!("Fatal error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.log.file.as_deref()) {
        eprintln!("Fatal error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, Arc::new(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: &Path) -> Result<Config> {
    let config = load_config(path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// stderr always; the configured log file as well when set.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")
}

fn run(command: Command, config: Arc<Config>) -> Result<()> {
    let sanitized = SanitizedConfig::from(config.as_ref());
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("runflow {} (config {})", VERSION, &config_hash[..16]);

    match command {
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&sanitized)?);
        }
        Command::Process {
            run,
            force_transfer,
        } => {
            let orchestrator = build_orchestrator(&config, force_transfer)?;
            match run {
                Some(path) => {
                    let outcome = orchestrator.run_single(&path);
                    info!("Run {}: {}", path.display(), outcome.as_str());
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
                None => {
                    let summary = orchestrator
                        .run_batch()
                        .context("Batch processing aborted")?;
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
        Command::Transfer {
            run,
            analysis,
            force,
        } => {
            let orchestrator = build_orchestrator(&config, None)?;
            let outcome = orchestrator
                .transfer_single(&run, analysis, force)
                .with_context(|| format!("Failed to transfer {}", run.display()))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Upload { run } => {
            let orchestrator = build_orchestrator(&config, None)?;
            let outcome = orchestrator
                .upload_single(&run)
                .with_context(|| format!("Failed to upload {}", run.display()))?;
            info!("Status database upload for {}: {:?}", run.display(), outcome);
        }
    }
    Ok(())
}

fn build_orchestrator(config: &Arc<Config>, force_transfer: Option<bool>) -> Result<RunOrchestrator> {
    let mut settings = OrchestratorConfig::from_config(config);
    if let Some(force) = force_transfer {
        settings = settings.with_force_transfer(force);
    }
    info!(
        "Force transfer of QC-failed runs: {}",
        if settings.force_transfer { "yes" } else { "no" }
    );

    let statusdb = match &config.statusdb {
        Some(db) if db.enabled => {
            let client = CouchStatusDb::new(db).context("Failed to create status database client")?;
            info!("Status database at {} ({})", db.url, db.database);
            Some(StatusDbSync::new(
                Arc::new(client),
                config.analysis.statusdb_pending_dir(),
            ))
        }
        Some(_) => {
            info!("Status database disabled");
            None
        }
        None => {
            warn!("No status database configured, run records will not be uploaded");
            None
        }
    };

    Ok(RunOrchestrator::new(
        settings,
        Arc::new(IlluminaRunFactory::new(Arc::clone(config))),
        Arc::from(create_notifier(&config.mail)),
        statusdb,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_override() {
        let cli = Cli::try_parse_from([
            "runflow",
            "--config",
            "/etc/runflow.toml",
            "process",
            "--force-transfer",
            "false",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/runflow.toml"));
        assert!(matches!(
            cli.command,
            Command::Process {
                run: None,
                force_transfer: Some(false)
            }
        ));
    }

    #[test]
    fn test_parse_transfer() {
        let cli = Cli::try_parse_from([
            "runflow",
            "transfer",
            "--run",
            "/data/150101_X_0001_AHXXXXXX",
            "--analysis",
        ])
        .unwrap();
        match cli.command {
            Command::Transfer {
                run,
                analysis,
                force,
            } => {
                assert_eq!(run, PathBuf::from("/data/150101_X_0001_AHXXXXXX"));
                assert!(analysis);
                assert!(!force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
