//! Per-job bookkeeping shared by every worker: folds batch outcomes into the aggregator
//! and drives progress and item notifications.
//!
//! Listeners run on worker threads. A panicking listener loses the rest of that batch's
//! notifications but never the batch's counts or the worker.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

use super::aggregator::ResultAggregator;
use super::listeners::ListenerRegistry;
use super::progress::ProgressNotifier;
use crate::execution::{BatchObserver, BatchOutcome};
use crate::models::Batch;

pub struct JobTracker {
    aggregator: ResultAggregator,
    progress: ProgressNotifier,
}

impl JobTracker {
    pub fn new(
        job_id: impl Into<String>,
        total_batches: u64,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            aggregator: ResultAggregator::new(),
            progress: ProgressNotifier::new(job_id, total_batches, listeners),
        }
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn progress(&self) -> &ProgressNotifier {
        &self.progress
    }

    fn notify(&self, batch: &Batch, notify: impl FnOnce()) {
        if panic::catch_unwind(AssertUnwindSafe(notify)).is_err() {
            error!(
                job_id = %self.progress.job_id(),
                batch = batch.index,
                "❌ TRACKER: Listener panicked, remaining notifications for this batch skipped"
            );
        }
    }
}

impl BatchObserver for JobTracker {
    fn on_batch(&self, batch: &Batch, outcome: BatchOutcome) -> u64 {
        match outcome {
            BatchOutcome::Completed(result) => {
                let failed = self.aggregator.record_result(batch, &result);
                self.notify(batch, || {
                    self.progress
                        .batch_finished(self.aggregator.successful_batches());
                    self.progress.items(&result);
                });
                failed
            }
            BatchOutcome::InvocationFailed(error) | BatchOutcome::InfrastructureFailed(error) => {
                let failed = self.aggregator.record_failure(batch, error.to_string());
                self.notify(batch, || self.progress.items_failed(&batch.items));
                failed
            }
        }
    }
}
