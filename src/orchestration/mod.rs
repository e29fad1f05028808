//! # Orchestration
//!
//! Wires a flow run together: the [`FlowRunner`] collects items and starts the batch
//! dispatcher, a [`JobTracker`] folds batch outcomes into the [`ResultAggregator`] and
//! drives the [`ProgressNotifier`], and the [`CompletionMonitor`] finalizes the job once
//! every worker has exited.
//!
//! ## Core Components
//!
//! - **FlowRunner**: configuration, listener registration, `run` and `await_completion`
//! - **JobTicket**: handle on a started job; stops intake early
//! - **ResultAggregator**: atomic counters plus the bounded error buffer
//! - **ProgressNotifier**: throttled, monotonic percent-complete notifications
//! - **CompletionMonitor**: supervisor thread deriving the terminal status

pub mod aggregator;
pub mod listeners;
pub mod monitor;
pub mod progress;
pub mod runner;
pub mod ticket;
pub mod tracker;

pub use aggregator::{ErrorBuffer, ResultAggregator};
pub use listeners::{
    FinishedCallback, FlowListener, ItemCallback, ListenerKind, ListenerRegistry, StatusCallback,
};
pub use monitor::{CompletionMonitor, MonitorHandle};
pub use progress::{percent_complete, ProgressNotifier};
pub use runner::FlowRunner;
pub use ticket::JobTicket;
pub use tracker::JobTracker;
