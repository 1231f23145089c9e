pub mod config;
pub mod discovery;
pub mod ledger;
pub mod notify;
pub mod orchestrator;
pub mod run;
pub mod sequencer;
pub mod statusdb;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use discovery::RunDiscovery;
pub use ledger::{LedgerError, QcLedger, TransferLedger};
pub use notify::{create_notifier, Notifier, NotifyError};
pub use orchestrator::{
    BatchSummary, OrchestratorConfig, OrchestratorError, RunOrchestrator, RunOutcome,
};
pub use run::{IlluminaRunFactory, RunError, RunFactory, RunHandle, RunStatus};
pub use sequencer::{resolve_sequencer_type, SequencerType};
pub use statusdb::{CouchStatusDb, StatusDb, StatusDbError, StatusDbSync};
