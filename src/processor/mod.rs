//! # Batch Processing
//!
//! The processor is the only network-facing boundary of a run: it executes a flow step
//! over one batch of items on a remote endpoint and reports a structured [`BatchResult`].
//! Processors are bound to a source connection; the dispatcher resolves one per connection
//! through [`ProcessorCache`] and reuses it for every batch sent over that connection.

pub mod async_bridge;
pub mod cache;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::models::{BatchRequest, BatchResult};

pub use async_bridge::{AsyncBatchProcessor, BlockingProcessor};
pub use cache::ProcessorCache;

/// Errors surfaced by processors and their factories
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessorError {
    /// The remote call for a batch failed
    #[error("Batch invocation failed: {0}")]
    Invocation(String),

    /// The batch layer could not run the batch at all
    #[error("Batch infrastructure failure: {0}")]
    Infrastructure(String),
}

impl ProcessorError {
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}

/// Stable identity of a source connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Runs a flow step over one batch of items.
///
/// Called synchronously from a worker thread; a call that never returns occupies its
/// worker for the rest of the run.
pub trait BatchProcessor: Send + Sync {
    fn run(&self, request: &BatchRequest) -> Result<BatchResult, ProcessorError>;
}

/// Builds the processor bound to a source connection
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, connection: &ConnectionId) -> Result<Arc<dyn BatchProcessor>, ProcessorError>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(&ConnectionId) -> Result<Arc<dyn BatchProcessor>, ProcessorError> + Send + Sync,
{
    fn create(&self, connection: &ConnectionId) -> Result<Arc<dyn BatchProcessor>, ProcessorError> {
        self(connection)
    }
}
