#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Flow Runner
//!
//! Batch-oriented job runner for data flows.
//!
//! ## Overview
//!
//! A flow step runs against a large, dynamically discovered set of item identifiers. The
//! runner collects those identifiers, partitions them into fixed-size batches, runs the
//! batches concurrently against a batch processor, aggregates per-item outcomes and
//! reports progress until the job completes or is stopped early.
//!
//! ## Module Organization
//!
//! - [`collector`] - Item discovery (`ItemSource`) and the collected item queue
//! - [`execution`] - Batch partitioning, cancellation and the worker pool
//! - [`processor`] - Batch processor seam, per-connection cache and async bridge
//! - [`orchestration`] - Runner, aggregation, progress and completion monitoring
//! - [`state_machine`] - Job statuses and terminal status derivation
//! - [`models`] - Flow, job and batch records
//! - [`persistence`] - Optional job storage
//! - [`config`] - Layered runner configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flow_runner::collector::FileItemSource;
//! use flow_runner::config::RunnerConfig;
//! use flow_runner::models::{BatchRequest, BatchResult, Flow};
//! use flow_runner::processor::{BatchProcessor, ConnectionId, ProcessorError};
//! use flow_runner::FlowRunner;
//! use std::sync::Arc;
//!
//! struct Remote;
//!
//! impl BatchProcessor for Remote {
//!     fn run(&self, request: &BatchRequest) -> Result<BatchResult, ProcessorError> {
//!         Err(ProcessorError::Invocation(format!("no endpoint for {}", request.flow_name)))
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! flow_runner::logging::init_structured_logging();
//!
//! let factory = |_: &ConnectionId| -> Result<Arc<dyn BatchProcessor>, ProcessorError> {
//!     Ok(Arc::new(Remote))
//! };
//! let mut runner = FlowRunner::new(Arc::new(FileItemSource::new("items.txt")), Arc::new(factory))
//!     .with_config(RunnerConfig::from_env()?)
//!     .with_flow(Arc::new(Flow::new("customers")));
//!
//! let ticket = runner.run()?;
//! runner.await_completion()?;
//! println!("{} finished with {}", ticket.job_id(), ticket.status());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod execution;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod processor;
pub mod state_machine;

pub use collector::{CollectionError, FileItemSource, ItemQueue, ItemSource, VecItemSource};
pub use config::{ConfigurationError, RunnerConfig};
pub use error::{FlowError, Result};
pub use models::{BatchRequest, BatchResult, Flow, Job, JobCounts};
pub use orchestration::{FlowRunner, JobTicket};
pub use persistence::{InMemoryJobStore, JobStore, PersistenceError};
pub use processor::{
    AsyncBatchProcessor, BatchProcessor, BlockingProcessor, ConnectionId, ProcessorError,
    ProcessorFactory,
};
pub use state_machine::JobStatus;
