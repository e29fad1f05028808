use std::error::Error as StdError;

use crate::collector::CollectionError;
use crate::config::ConfigurationError;
use crate::persistence::PersistenceError;
use crate::processor::ProcessorError;

/// Crate-level error for the flow runner
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Interrupted while waiting: {0}")]
    Interrupted(String),

    #[error("Failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FlowError>;

/// Render an error together with its `source()` chain, one cause per line.
///
/// Used for job output where the full causal chain is the only diagnostic
/// a caller gets back.
pub fn error_report(error: &(dyn StdError + 'static)) -> String {
    let mut report = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        report.push_str("\nCaused by: ");
        report.push_str(&cause.to_string());
        source = cause.source();
    }
    report
}
