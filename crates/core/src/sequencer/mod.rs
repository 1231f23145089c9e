//! Instrument family classification.
//!
//! A run directory is classified from the application name recorded in its
//! run parameters descriptor. Classification never fails hard: anything that
//! cannot be read or recognised is [`SequencerType::Unknown`].

mod resolver;
mod types;

pub use resolver::{read_application_name, resolve_sequencer_type, ResolveError};
pub use types::SequencerType;
