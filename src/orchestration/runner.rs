//! # Flow Runner
//!
//! Entry point for executing one step of a flow. The runner collects the step's items
//! synchronously, partitions them into batches, hands the batches to a pool of worker
//! threads and returns a [`JobTicket`] as soon as dispatch has started. A completion
//! monitor thread finalizes the job once the pool drains.
//!
//! ```rust,no_run
//! use flow_runner::collector::VecItemSource;
//! use flow_runner::models::{BatchRequest, BatchResult, Flow};
//! use flow_runner::orchestration::FlowRunner;
//! use flow_runner::processor::{BatchProcessor, ConnectionId, ProcessorError};
//! use std::sync::Arc;
//!
//! struct Harmonizer;
//!
//! impl BatchProcessor for Harmonizer {
//!     fn run(&self, request: &BatchRequest) -> Result<BatchResult, ProcessorError> {
//!         let items: Vec<String> = request.items().into_iter().map(String::from).collect();
//!         Ok(BatchResult {
//!             total_count: items.len() as u64,
//!             completed_items: items,
//!             ..BatchResult::default()
//!         })
//!     }
//! }
//!
//! # fn main() -> flow_runner::Result<()> {
//! let factory = |_: &ConnectionId| -> Result<Arc<dyn BatchProcessor>, ProcessorError> {
//!     Ok(Arc::new(Harmonizer))
//! };
//! let mut runner = FlowRunner::new(
//!     Arc::new(VecItemSource::new(["/customer/1.json", "/customer/2.json"])),
//!     Arc::new(factory),
//! )
//! .with_flow(Arc::new(Flow::new("customers")))
//! .with_batch_size(1)
//! .on_status_changed(|job_id, percent, _| println!("{job_id}: {percent}%"));
//!
//! let ticket = runner.run()?;
//! runner.await_completion()?;
//! println!("{}", ticket.status());
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::listeners::{FlowListener, ListenerRegistry};
use super::monitor::{CompletionMonitor, MonitorHandle};
use super::ticket::JobTicket;
use super::tracker::JobTracker;
use crate::collector::{ItemQueue, ItemSource};
use crate::config::{ConfigurationError, RunnerConfig};
use crate::error::{error_report, FlowError, Result};
use crate::execution::{batch_count, BatchDispatcher, Batcher, CancellationToken, DispatchSettings};
use crate::logging;
use crate::models::{Flow, Job, JobCounts};
use crate::persistence::JobStore;
use crate::processor::{ConnectionId, ProcessorCache, ProcessorFactory};
use crate::state_machine::JobStatus;

/// Configures and runs one flow step
pub struct FlowRunner {
    source: Arc<dyn ItemSource>,
    factory: Arc<dyn ProcessorFactory>,
    flow: Option<Arc<Flow>>,
    config: RunnerConfig,
    options: Map<String, Value>,
    listeners: ListenerRegistry,
    store: Option<Arc<dyn JobStore>>,
    monitor: Option<MonitorHandle>,
    ticket: Option<JobTicket>,
}

impl FlowRunner {
    pub fn new(source: Arc<dyn ItemSource>, factory: Arc<dyn ProcessorFactory>) -> Self {
        Self {
            source,
            factory,
            flow: None,
            config: RunnerConfig::default(),
            options: Map::new(),
            listeners: ListenerRegistry::new(),
            store: None,
            monitor: None,
            ticket: None,
        }
    }

    pub fn with_flow(mut self, flow: Arc<Flow>) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Replace every run setting with a loaded configuration
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.config.thread_count = thread_count;
        self
    }

    pub fn with_stop_on_failure(mut self, stop_on_failure: bool) -> Self {
        self.config.stop_on_failure = stop_on_failure;
        self
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.config.step = step;
        self
    }

    /// Base options sent with every batch. `flow` and `uri` are always overwritten.
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Run every batch against a single connection
    pub fn with_source_connection(self, connection: impl Into<String>) -> Self {
        self.with_source_connections([connection])
    }

    /// Spread batches round-robin across these connections
    pub fn with_source_connections<I, S>(mut self, connections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.source_connections = connections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_destination_database(mut self, database: impl Into<String>) -> Self {
        self.config.destination_database = Some(database.into());
        self
    }

    pub fn with_job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_item_complete(
        mut self,
        listener: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.register(FlowListener::ItemCompleted(Arc::new(listener)));
        self
    }

    pub fn on_item_failed(mut self, listener: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.listeners.register(FlowListener::ItemFailed(Arc::new(listener)));
        self
    }

    pub fn on_status_changed(
        mut self,
        listener: impl Fn(&str, u32, &str) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.register(FlowListener::StatusChanged(Arc::new(listener)));
        self
    }

    pub fn on_finished(mut self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.listeners.register(FlowListener::Finished(Arc::new(listener)));
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Ticket of the most recent run, if any
    pub fn ticket(&self) -> Option<&JobTicket> {
        self.ticket.as_ref()
    }

    /// Snapshot of the most recent job record
    pub fn job(&self) -> Option<Job> {
        self.ticket.as_ref().map(JobTicket::job)
    }

    /// Collect items and start dispatching them.
    ///
    /// Only configuration problems are returned as errors. A collection failure produces
    /// a ticket for a FAILED job and starts no workers.
    pub fn run(&mut self) -> Result<JobTicket> {
        let flow = self
            .flow
            .clone()
            .ok_or(ConfigurationError::Missing("flow"))?;
        self.config.validate()?;

        let step = self.config.step;
        if !flow.accepts_step(step) {
            return Err(ConfigurationError::InvalidValue {
                field: "step",
                reason: format!("flow '{}' has no step {step}", flow.name),
            }
            .into());
        }

        let job = Arc::new(RwLock::new(Job::with_flow(&flow, step)));
        let listeners = Arc::new(self.listeners.clone());

        info!(
            flow = %flow.name,
            step,
            batch_size = self.config.batch_size,
            thread_count = self.config.thread_count,
            stop_on_failure = self.config.stop_on_failure,
            "🚀 RUNNER: Collecting items"
        );

        let collected = self.source.collect(&flow.name, step);
        let job_id = Uuid::new_v4().to_string();
        job.write().id = Some(job_id.clone());

        let queue = match collected {
            Ok(queue) => queue,
            Err(e) => {
                let report = error_report(&e);
                logging::log_error("RUNNER", "collect", &report, Some(&flow.name));
                self.finish_without_dispatch(&job, &job_id, report, None);

                let ticket = JobTicket::new(job_id, CancellationToken::new(), job);
                self.monitor = None;
                self.ticket = Some(ticket.clone());
                return Ok(ticket);
            }
        };

        self.start_dispatch(&flow, job, job_id, queue, listeners)
    }

    fn start_dispatch(
        &mut self,
        flow: &Flow,
        job: Arc<RwLock<Job>>,
        job_id: String,
        queue: ItemQueue,
        listeners: Arc<ListenerRegistry>,
    ) -> Result<JobTicket> {
        let total_items = queue.len() as u64;
        let total_batches = batch_count(queue.len(), self.config.batch_size) as u64;
        let tracker = Arc::new(JobTracker::new(
            job_id.clone(),
            total_batches,
            Arc::clone(&listeners),
        ));

        tracker.progress().started();
        {
            let mut job = job.write();
            job.transition_to(JobStatus::Running)?;
            self.save(&job);
        }
        logging::log_job_operation(
            "dispatch",
            Some(&job_id),
            &flow.name,
            &JobStatus::Running.to_string(),
            None,
        );

        let settings = DispatchSettings {
            job_id: job_id.clone(),
            flow_name: flow.name.clone(),
            step: self.config.step,
            target_database: self.config.destination_database.clone(),
            options: self.options.clone(),
            connections: self
                .config
                .source_connections
                .iter()
                .map(ConnectionId::new)
                .collect(),
            thread_count: self.config.thread_count,
            stop_on_failure: self.config.stop_on_failure,
        };

        debug!(
            job_id = %job_id,
            total_items,
            total_batches,
            connections = settings.connections.len(),
            "Starting batch dispatch"
        );

        let monitor = CompletionMonitor {
            job_id: job_id.clone(),
            tracker: Arc::clone(&tracker),
            job: Arc::clone(&job),
            listeners,
            store: self.store.clone(),
            total_items,
            stop_on_failure: self.config.stop_on_failure,
        }
        .spawn()
        .inspect_err(|e| self.finish_without_dispatch(&job, &job_id, error_report(e), None))?;

        let token = CancellationToken::new();
        let dispatch = match BatchDispatcher::new(
            settings,
            Batcher::new(queue, self.config.batch_size),
            ProcessorCache::new(Arc::clone(&self.factory)),
            tracker.clone(),
            token.clone(),
        )
        .start()
        {
            Ok(dispatch) => dispatch,
            Err(e) => {
                // Dropping the handle before any pool is attached releases the monitor
                if let Err(join_error) = monitor.join() {
                    warn!(
                        job_id = %job_id,
                        error = %join_error,
                        "⚠️ RUNNER: Idle monitor did not exit cleanly"
                    );
                }
                self.finish_without_dispatch(&job, &job_id, error_report(&e), None);
                return Err(e);
            }
        };

        if let Err(dispatch) = monitor.attach(dispatch) {
            dispatch.stop();
            dispatch.join();
            let error = monitor.join().err().unwrap_or_else(|| {
                FlowError::Interrupted("completion monitor exited before dispatch".to_string())
            });
            let counts = tracker.aggregator().counts();
            self.finish_without_dispatch(&job, &job_id, error_report(&error), Some(counts));
            return Err(error);
        }

        let ticket = JobTicket::new(job_id, token, job).with_tracker(tracker);
        self.monitor = Some(monitor);
        self.ticket = Some(ticket.clone());
        Ok(ticket)
    }

    /// Terminal FAILED write for runs whose worker pool never came under supervision.
    /// `counts` carries whatever the pool managed before it was stopped.
    fn finish_without_dispatch(
        &self,
        job: &RwLock<Job>,
        job_id: &str,
        report: String,
        counts: Option<JobCounts>,
    ) {
        let mut job = job.write();
        let counts = counts.unwrap_or_default();
        if let Err(e) = job.finish(JobStatus::Failed, counts, vec![report]) {
            warn!(job_id = %job_id, error = %e, "⚠️ RUNNER: Could not mark job failed");
        }
        logging::log_job_operation(
            "finish",
            Some(job_id),
            &job.flow,
            &job.status.to_string(),
            job.output.first().map(String::as_str),
        );
        self.save(&job);
    }

    fn save(&self, job: &Job) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(job) {
                warn!(job_id = ?job.id, error = %e, "⚠️ RUNNER: Failed to persist job");
            }
        }
    }

    /// Block until the current run is finalized. Returns immediately if nothing is running.
    pub fn await_completion(&mut self) -> Result<()> {
        let Some(monitor) = self.monitor.take() else {
            return Ok(());
        };
        monitor.wait(None);
        monitor.join().map(|_| ())
    }

    /// Like [`Self::await_completion`] but gives up after `timeout`.
    /// Returns `Ok(false)` if the run is still in progress.
    pub fn await_completion_timeout(&mut self, timeout: Duration) -> Result<bool> {
        let Some(monitor) = self.monitor.as_ref() else {
            return Ok(true);
        };
        if !monitor.wait(Some(timeout)) {
            return Ok(false);
        }
        match self.monitor.take() {
            Some(monitor) => monitor.join().map(|_| true),
            None => Ok(true),
        }
    }

    /// True while a started run has not been awaited
    pub fn is_running(&self) -> bool {
        self.monitor
            .as_ref()
            .is_some_and(|monitor| !monitor.is_finished())
    }
}

impl std::fmt::Debug for FlowRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowRunner")
            .field("flow", &self.flow.as_ref().map(|flow| &flow.name))
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("running", &self.is_running())
            .finish()
    }
}
