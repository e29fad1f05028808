//! # Completion Monitor
//!
//! One supervisor thread per run. It waits for the worker pool to drain, reports 100%,
//! stops the dispatcher, resolves the terminal status from the aggregated counts, writes
//! the job record and finally notifies the finished listeners.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::listeners::ListenerRegistry;
use super::tracker::JobTracker;
use crate::error::{FlowError, Result};
use crate::execution::DispatchHandle;
use crate::logging;
use crate::models::Job;
use crate::persistence::JobStore;
use crate::state_machine::{resolve_terminal_status, CompletionCounts};

pub struct CompletionMonitor {
    pub(crate) job_id: String,
    pub(crate) tracker: Arc<JobTracker>,
    pub(crate) job: Arc<RwLock<Job>>,
    pub(crate) listeners: Arc<ListenerRegistry>,
    pub(crate) store: Option<Arc<dyn JobStore>>,
    pub(crate) total_items: u64,
    pub(crate) stop_on_failure: bool,
}

impl CompletionMonitor {
    /// Start the monitor thread. It idles until a worker pool is handed over with
    /// [`MonitorHandle::attach`] and exits untouched if the handle is dropped first.
    pub fn spawn(self) -> Result<MonitorHandle> {
        let (pool_tx, pool_rx) = channel::bounded::<DispatchHandle>(1);
        let (done_tx, done_rx) = channel::bounded::<()>(0);
        let name = "flow-monitor".to_string();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.supervise(pool_rx, done_tx))
            .map_err(|source| FlowError::ThreadSpawn { name, source })?;

        Ok(MonitorHandle {
            handle,
            pool: pool_tx,
            done: done_rx,
        })
    }

    // `_done` is dropped when this returns or unwinds, which is what waiters observe.
    fn supervise(self, pool: Receiver<DispatchHandle>, _done: Sender<()>) -> Option<Job> {
        match pool.recv() {
            Ok(dispatch) => Some(self.run(dispatch)),
            Err(_) => {
                debug!(job_id = %self.job_id, "No worker pool attached, monitor leaving");
                None
            }
        }
    }

    /// Drain the dispatcher and finalize the job. Returns the final job record.
    pub fn run(self, dispatch: DispatchHandle) -> Job {
        let token = dispatch.token().clone();
        let report = dispatch.join();
        if report.workers_panicked > 0 {
            error!(
                job_id = %self.job_id,
                panicked = report.workers_panicked,
                "❌ MONITOR: Batch workers panicked, their remaining batches were not processed"
            );
        }

        self.tracker.progress().completed();
        token.cancel();

        let aggregator = self.tracker.aggregator();
        let counts = aggregator.counts();
        let status = resolve_terminal_status(CompletionCounts {
            stop_on_failure: self.stop_on_failure,
            successful_events: counts.success_count,
            failed_events: counts.failure_count,
            total_items: self.total_items,
        });

        let job = {
            let mut job = self.job.write();
            if let Err(e) = job.finish(status, counts, aggregator.error_messages()) {
                error!(job_id = %self.job_id, error = %e, "❌ MONITOR: Could not finalize job");
            }
            job.clone()
        };

        info!(
            job_id = %self.job_id,
            status = %job.status,
            batches_dispatched = report.batches_dispatched,
            successful_events = counts.success_count,
            failed_events = counts.failure_count,
            successful_batches = counts.successful_batches,
            failed_batches = counts.failed_batches,
            total_items = self.total_items,
            "🏁 MONITOR: Job finished"
        );
        logging::log_job_operation(
            "finish",
            Some(&self.job_id),
            &job.flow,
            &job.status.to_string(),
            None,
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&job) {
                warn!(
                    job_id = %self.job_id,
                    error = %e,
                    "⚠️ MONITOR: Failed to persist finished job"
                );
            }
        }

        self.listeners.finished();
        job
    }
}

/// Running completion monitor
pub struct MonitorHandle {
    handle: JoinHandle<Option<Job>>,
    pool: Sender<DispatchHandle>,
    done: Receiver<()>,
}

impl MonitorHandle {
    /// Hand the started worker pool to the monitor. The pool is given back if the
    /// monitor thread is gone.
    pub fn attach(&self, dispatch: DispatchHandle) -> std::result::Result<(), DispatchHandle> {
        self.pool.send(dispatch).map_err(|rejected| rejected.into_inner())
    }

    /// Wait for the monitor to finish; `None` waits indefinitely.
    /// Returns `false` if the timeout elapsed first.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            None => {
                let _ = self.done.recv();
                true
            }
            Some(timeout) => !matches!(
                self.done.recv_timeout(timeout),
                Err(RecvTimeoutError::Timeout)
            ),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Reap the monitor thread; fails if it did not finish normally.
    /// Yields the final job record, or `None` if no pool was ever attached.
    pub fn join(self) -> Result<Option<Job>> {
        let Self { handle, pool, .. } = self;
        drop(pool);
        handle.join().map_err(|_| {
            FlowError::Interrupted("completion monitor terminated abnormally".to_string())
        })
    }
}
