//! Run parameters lookup.

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::types::SequencerType;

/// Descriptor written by HiSeq-family control software.
pub const RUN_PARAMETERS: &str = "runParameters.xml";
/// Descriptor name used by NextSeq and newer control software.
pub const RUN_PARAMETERS_ALT: &str = "RunParameters.xml";

/// Reasons a run could not be classified.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("neither runParameters.xml nor RunParameters.xml found in {run}")]
    DescriptorMissing { run: PathBuf },

    #[error("cannot read {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no application name in {path}")]
    ApplicationNameMissing { path: PathBuf },
}

/// Classifies a run directory by its run parameters descriptor.
///
/// Returns [`SequencerType::Unknown`] and logs a warning naming the run when
/// the descriptor is missing, unreadable or reports an unrecognised
/// application.
pub fn resolve_sequencer_type(run_dir: &Path) -> SequencerType {
    let application = match read_application_name(run_dir) {
        Ok(application) => application,
        Err(e) => {
            warn!(
                "{}; archive the run {} manually",
                e,
                run_dir.display()
            );
            return SequencerType::Unknown;
        }
    };

    let sequencer = SequencerType::from_application_name(&application);
    if sequencer.is_known() {
        debug!("Run {} classified as {}", run_dir.display(), sequencer);
    } else {
        warn!(
            "Unrecognized application {:?} for run {}; no support for this instrument",
            application,
            run_dir.display()
        );
    }
    sequencer
}

/// Reads the application name from the run parameters descriptor.
pub fn read_application_name(run_dir: &Path) -> Result<String, ResolveError> {
    let path = descriptor_path(run_dir).ok_or_else(|| ResolveError::DescriptorMissing {
        run: run_dir.to_path_buf(),
    })?;

    let contents = std::fs::read_to_string(&path).map_err(|source| ResolveError::Unreadable {
        path: path.clone(),
        source,
    })?;

    extract_application_name(&contents).ok_or(ResolveError::ApplicationNameMissing { path })
}

fn descriptor_path(run_dir: &Path) -> Option<PathBuf> {
    [RUN_PARAMETERS, RUN_PARAMETERS_ALT]
        .iter()
        .map(|name| run_dir.join(name))
        .find(|path| path.is_file())
}

/// Recent control software nests `<ApplicationName>` under `<Setup>`; older
/// versions only carry `<Application>`.
fn extract_application_name(xml: &str) -> Option<String> {
    let patterns = [
        r"<ApplicationName>\s*([^<]*?)\s*</ApplicationName>",
        r"<Application>\s*([^<]*?)\s*</Application>",
    ];

    patterns.iter().find_map(|pattern| {
        let re = Regex::new(pattern).ok()?;
        re.captures(xml)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|name| !name.is_empty())
    })
}
