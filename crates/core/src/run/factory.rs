//! Run handle construction per instrument family.

use std::path::Path;
use std::sync::Arc;
use tracing::warn;

use super::hiseq::HiSeqRun;
use super::hiseqx::HiSeqXRun;
use super::traits::{RunFactory, RunHandle};
use crate::config::Config;
use crate::sequencer::SequencerType;

type Constructor = fn(&Path, Arc<Config>) -> Box<dyn RunHandle>;

fn hiseqx(dir: &Path, config: Arc<Config>) -> Box<dyn RunHandle> {
    Box::new(HiSeqXRun::new(dir, config))
}

fn hiseq(dir: &Path, config: Arc<Config>) -> Box<dyn RunHandle> {
    Box::new(HiSeqRun::new(dir, config))
}

/// Families with a handle implementation. Adding one is one more row.
const CONSTRUCTORS: &[(SequencerType, Constructor)] = &[
    (SequencerType::HiSeqX, hiseqx),
    (SequencerType::HiSeq, hiseq),
];

/// Builds handles for Illumina run directories.
#[derive(Debug, Clone)]
pub struct IlluminaRunFactory {
    config: Arc<Config>,
}

impl IlluminaRunFactory {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

impl RunFactory for IlluminaRunFactory {
    fn build(&self, sequencer: SequencerType, run_dir: &Path) -> Option<Box<dyn RunHandle>> {
        let constructor = CONSTRUCTORS
            .iter()
            .find(|(s, _)| *s == sequencer)
            .map(|(_, c)| c);

        match constructor {
            Some(construct) => Some(construct(run_dir, Arc::clone(&self.config))),
            None => {
                warn!(
                    "No run handle for {} runs, skipping {}",
                    sequencer,
                    run_dir.display()
                );
                None
            }
        }
    }
}
