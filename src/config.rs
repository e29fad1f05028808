//! # Runner Configuration
//!
//! Layered configuration for a flow run. Defaults come from [`crate::constants`],
//! optionally overridden by a configuration file (TOML, YAML or JSON, detected from the
//! extension) and finally by `FLOW_RUNNER_*` environment variables.
//!
//! ```rust,no_run
//! use flow_runner::config::RunnerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunnerConfig::load("config/flow-runner.toml")?;
//! println!("batch size: {}", config.batch_size);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::constants::{self, env};

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Settings for a single flow run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of item identifiers sent per batch
    pub batch_size: usize,
    /// Number of batches processed concurrently
    pub thread_count: usize,
    /// Stop taking new batches once any item fails
    pub stop_on_failure: bool,
    /// Flow step to execute
    pub step: u32,
    /// Database the processor writes results into
    pub destination_database: Option<String>,
    /// Connection identities batches are spread across
    pub source_connections: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            thread_count: constants::DEFAULT_THREAD_COUNT,
            stop_on_failure: false,
            step: constants::DEFAULT_STEP,
            destination_database: None,
            source_connections: vec![constants::DEFAULT_CONNECTION.to_string()],
        }
    }
}

impl RunnerConfig {
    /// Defaults overridden by `FLOW_RUNNER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::build(None)
    }

    /// Load a configuration file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        Self::build(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading runner configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        let environment = config::Environment::with_prefix(env::PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("source_connections");
        let settings = builder.add_source(environment).build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the dispatcher cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "batch_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.thread_count == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "thread_count",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.source_connections.is_empty() {
            return Err(ConfigurationError::Missing("source_connections"));
        }
        Ok(())
    }
}
