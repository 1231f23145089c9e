//! External program invocation.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use super::error::RunError;

/// Number of trailing stderr bytes kept in failure reports.
const STDERR_TAIL: usize = 2000;

/// Exit information of a program that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stderr_tail: String,
}

/// Starts a long-running program without waiting for it.
///
/// stdout and stderr go to `<log_stem>.out` and `<log_stem>.err`. Returns the
/// child pid. The child outlives this process.
pub fn spawn_detached(
    program: &Path,
    args: &[String],
    working_dir: &Path,
    log_stem: &Path,
) -> Result<u32, RunError> {
    let out_path = log_stem.with_extension("out");
    let err_path = log_stem.with_extension("err");
    let stdout = File::create(&out_path).map_err(|e| RunError::io(&out_path, e))?;
    let stderr = File::create(&err_path).map_err(|e| RunError::io(&err_path, e))?;

    debug!("Spawning {} {}", program.display(), args.join(" "));

    let child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    Ok(child.id())
}

/// Runs a program to completion, capturing stderr.
pub fn run_to_completion(program: &Path, args: &[String]) -> Result<CommandOutcome, RunError> {
    debug!("Running {} {}", program.display(), args.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| RunError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let start = stderr
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| stderr.len() - i <= STDERR_TAIL)
        .unwrap_or(stderr.len());

    Ok(CommandOutcome {
        success: output.status.success(),
        exit_code: output.status.code(),
        stderr_tail: stderr[start..].trim().to_string(),
    })
}
