//! Transfer to the analysis server.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::context::RunContext;
use super::error::RunError;
use super::process::run_to_completion;
use super::types::TransferReport;
use crate::config::AnalysisServerConfig;

/// rsync arguments copying `run_dir` into the remote data archive.
pub fn rsync_args(server: &AnalysisServerConfig, run_dir: &Path) -> Vec<String> {
    let mut args = server.rsync_options.clone();
    args.extend(server.excludes.iter().map(|p| format!("--exclude={}", p)));
    args.push(run_dir.display().to_string());
    args.push(server.rsync_destination());
    args
}

/// Copies the run, archives it locally and optionally starts analysis.
///
/// Archiving and the analysis trigger only follow a successful copy. Their
/// failures are logged; the report still counts as dispatched.
pub fn transfer_run(
    ctx: &RunContext,
    archive_root: Option<&Path>,
    start_analysis: bool,
) -> Result<TransferReport, RunError> {
    let server = &ctx.config.analysis_server;
    let destination = server.rsync_destination();

    info!("Transferring run {} to {}", ctx.id, destination);
    let outcome = run_to_completion(&server.rsync, &rsync_args(server, ctx.path()))?;

    let mut report = TransferReport {
        run_id: ctx.id.id.clone(),
        destination,
        success: outcome.success,
        exit_code: outcome.exit_code,
        archived_to: None,
        analysis_started: false,
    };

    if !outcome.success {
        warn!(
            "Transfer of run {} failed ({:?}): {}",
            ctx.id, outcome.exit_code, outcome.stderr_tail
        );
        return Ok(report);
    }

    if let Some(root) = archive_root {
        match archive(ctx.path(), root) {
            Ok(archived) => {
                info!("Run {} archived to {}", ctx.id, archived.display());
                report.archived_to = Some(archived);
            }
            Err(e) => warn!("Could not archive run {}: {}", ctx.id, e),
        }
    }

    if start_analysis {
        match trigger_analysis(server, &ctx.id.id) {
            Ok(()) => {
                info!("Analysis started for run {}", ctx.id);
                report.analysis_started = true;
            }
            Err(e) => warn!("{}", e),
        }
    }

    Ok(report)
}

/// Moves the run directory under `root`, keeping its name.
fn archive(run_dir: &Path, root: &Path) -> Result<PathBuf, RunError> {
    let name = run_dir
        .file_name()
        .ok_or_else(|| RunError::io(run_dir, std::io::Error::other("run path has no name")))?;
    let target = root.join(name);
    if target == run_dir {
        return Ok(target);
    }
    fs::create_dir_all(root).map_err(|e| RunError::io(root, e))?;
    fs::rename(run_dir, &target).map_err(|e| RunError::io(&target, e))?;
    Ok(target)
}

/// Asks the analysis server to start processing a flowcell.
pub fn trigger_analysis(server: &AnalysisServerConfig, run_id: &str) -> Result<(), RunError> {
    let url = format!(
        "http://{}:{}/flowcell_analysis/{}",
        server.host,
        server.port,
        urlencoding::encode(run_id)
    );
    let failed = |reason: String| RunError::AnalysisTrigger {
        run_id: run_id.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(server.timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(&url).send().map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("{} returned {}", url, response.status())));
    }
    Ok(())
}
