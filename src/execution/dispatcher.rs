//! # Batch Dispatcher
//!
//! Fixed-size pool of worker threads pulling batches from a shared [`Batcher`]. Each
//! worker resolves the processor for its batch's connection, runs the batch synchronously
//! and hands the outcome to a [`BatchObserver`]. Workers check the cancellation token
//! before taking every batch, which is how stop-on-failure and ticket stops halt intake.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::batcher::Batcher;
use super::cancellation::CancellationToken;
use crate::error::{FlowError, Result};
use crate::logging;
use crate::models::{Batch, BatchRequest, BatchResult};
use crate::processor::{ConnectionId, ProcessorCache, ProcessorError};

/// How a single batch ended
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The processor ran the batch and reported per-item results
    Completed(BatchResult),
    /// The remote call itself failed
    InvocationFailed(ProcessorError),
    /// The batch could not be run at all (no processor for its connection, or the
    /// processor reported a batch-layer failure)
    InfrastructureFailed(ProcessorError),
}

/// Receives every finished batch, from whichever worker ran it.
///
/// Runs on the worker thread outside the processor's panic guard: an observer that panics
/// takes its worker down with it, so implementations contain their own callbacks.
pub trait BatchObserver: Send + Sync {
    /// Record the outcome and return how many items were counted as failed
    fn on_batch(&self, batch: &Batch, outcome: BatchOutcome) -> u64;
}

/// Fixed parameters shared by every worker of one run
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub job_id: String,
    pub flow_name: String,
    pub step: u32,
    pub target_database: Option<String>,
    /// Base run options; every batch gets its own copy with its items injected
    pub options: Map<String, Value>,
    /// Batches are spread over these round-robin by batch index
    pub connections: Vec<ConnectionId>,
    pub thread_count: usize,
    pub stop_on_failure: bool,
}

/// Totals reported once every worker has exited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub batches_dispatched: usize,
    pub workers_panicked: usize,
}

struct WorkerContext {
    settings: DispatchSettings,
    batcher: Mutex<Batcher>,
    cache: ProcessorCache,
    observer: Arc<dyn BatchObserver>,
    token: CancellationToken,
}

impl WorkerContext {
    fn run_worker(&self, worker: usize) -> usize {
        let mut dispatched = 0;
        loop {
            if self.token.is_cancelled() {
                debug!(worker, "Stop requested, worker leaving");
                break;
            }

            let Some(batch) = self.batcher.lock().next_batch() else {
                break;
            };

            dispatched += 1;
            self.process(worker, batch);
        }
        dispatched
    }

    fn connection_for(&self, batch: &Batch) -> &ConnectionId {
        let connections = &self.settings.connections;
        &connections[batch.index % connections.len()]
    }

    fn execute(&self, batch: &Batch) -> BatchOutcome {
        let connection = self.connection_for(batch);
        let processor = match self.cache.get_or_create(connection) {
            Ok(processor) => processor,
            Err(e) => return BatchOutcome::InfrastructureFailed(e),
        };

        let request = BatchRequest::new(
            self.settings.job_id.clone(),
            self.settings.flow_name.clone(),
            self.settings.step,
            self.settings.target_database.clone(),
            &self.settings.options,
            batch,
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| processor.run(&request)))
            .unwrap_or_else(|_| {
                Err(ProcessorError::Invocation(
                    "batch processor panicked".to_string(),
                ))
            });

        match result {
            Ok(result) => BatchOutcome::Completed(result),
            Err(e) if e.is_infrastructure() => BatchOutcome::InfrastructureFailed(e),
            Err(e) => BatchOutcome::InvocationFailed(e),
        }
    }

    fn process(&self, worker: usize, batch: Batch) {
        logging::log_batch_operation(
            "dispatch",
            &self.settings.job_id,
            batch.index,
            batch.len(),
            "STARTED",
            None,
        );

        let outcome = self.execute(&batch);
        match &outcome {
            BatchOutcome::Completed(result) => debug!(
                worker,
                batch = batch.index,
                total = result.total_count,
                errors = result.error_count,
                "Batch completed"
            ),
            BatchOutcome::InvocationFailed(e) => warn!(
                worker,
                batch = batch.index,
                error = %e,
                "⚠️ DISPATCH: Batch invocation failed"
            ),
            BatchOutcome::InfrastructureFailed(e) => error!(
                worker,
                batch = batch.index,
                error = %e,
                "❌ DISPATCH: Batch could not be run"
            ),
        }

        let failed = self.observer.on_batch(&batch, outcome);
        if self.settings.stop_on_failure && failed > 0 && self.token.cancel() {
            info!(
                job_id = %self.settings.job_id,
                batch = batch.index,
                failed,
                "🛑 DISPATCH: Item failure with stop-on-failure set, halting batch intake"
            );
        }
    }
}

/// Builds the worker pool for one run
pub struct BatchDispatcher {
    context: Arc<WorkerContext>,
}

impl BatchDispatcher {
    pub fn new(
        settings: DispatchSettings,
        batcher: Batcher,
        cache: ProcessorCache,
        observer: Arc<dyn BatchObserver>,
        token: CancellationToken,
    ) -> Self {
        Self {
            context: Arc::new(WorkerContext {
                settings,
                batcher: Mutex::new(batcher),
                cache,
                observer,
                token,
            }),
        }
    }

    /// Spawn the workers. If any worker cannot be spawned the ones already running are
    /// stopped and joined before the error is returned.
    pub fn start(self) -> Result<DispatchHandle> {
        let thread_count = self.context.settings.thread_count.max(1);
        let mut workers = Vec::with_capacity(thread_count);

        for worker in 0..thread_count {
            let context = Arc::clone(&self.context);
            let name = format!("flow-worker-{worker}");
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || context.run_worker(worker));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    let partial = DispatchHandle {
                        context: self.context,
                        workers,
                    };
                    partial.stop();
                    partial.join();
                    return Err(FlowError::ThreadSpawn { name, source });
                }
            }
        }

        info!(
            job_id = %self.context.settings.job_id,
            workers = thread_count,
            total_batches = self.context.batcher.lock().total_batches(),
            "🚀 DISPATCH: Batch workers started"
        );

        Ok(DispatchHandle {
            context: self.context,
            workers,
        })
    }
}

/// Running worker pool
pub struct DispatchHandle {
    context: Arc<WorkerContext>,
    workers: Vec<JoinHandle<usize>>,
}

impl DispatchHandle {
    /// Stop taking new batches; idempotent
    pub fn stop(&self) {
        self.context.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.context.token
    }

    /// Processors cached for this run
    pub fn cached_processors(&self) -> usize {
        self.context.cache.len()
    }

    /// Block until every worker has exited, then release the cached processors
    pub fn join(self) -> DrainReport {
        let mut report = DrainReport::default();
        for handle in self.workers {
            match handle.join() {
                Ok(dispatched) => report.batches_dispatched += dispatched,
                Err(_) => {
                    error!("❌ DISPATCH: Batch worker panicked");
                    report.workers_panicked += 1;
                }
            }
        }
        self.context.cache.clear();
        report
    }
}
