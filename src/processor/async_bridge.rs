//! # Async Processor Bridge
//!
//! Remote endpoints are usually reached through async clients, while batches run on plain
//! worker threads. [`BlockingProcessor`] drives an [`AsyncBatchProcessor`] to completion on
//! a tokio runtime so it can be used anywhere a [`BatchProcessor`] is expected.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::{BatchProcessor, ProcessorError};
use crate::models::{BatchRequest, BatchResult};

/// Async counterpart of [`BatchProcessor`]
#[async_trait]
pub trait AsyncBatchProcessor: Send + Sync {
    async fn run(&self, request: &BatchRequest) -> Result<BatchResult, ProcessorError>;
}

/// Runs an async processor on a tokio runtime from a blocking worker thread.
///
/// Worker threads are not runtime threads, so blocking on the handle is allowed; the
/// handle must belong to a runtime that outlives the run.
pub struct BlockingProcessor<P: ?Sized> {
    inner: Arc<P>,
    handle: Handle,
}

impl<P: AsyncBatchProcessor + ?Sized> BlockingProcessor<P> {
    pub fn new(inner: Arc<P>, handle: Handle) -> Self {
        Self { inner, handle }
    }
}

impl<P: AsyncBatchProcessor + ?Sized> BatchProcessor for BlockingProcessor<P> {
    fn run(&self, request: &BatchRequest) -> Result<BatchResult, ProcessorError> {
        self.handle.block_on(self.inner.run(request))
    }
}
