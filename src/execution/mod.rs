//! # Batch Execution
//!
//! Partitioning of collected items into batches and the fixed-size worker pool that runs
//! them against the batch processor.

pub mod batcher;
pub mod cancellation;
pub mod dispatcher;

pub use batcher::{batch_count, Batcher};
pub use cancellation::CancellationToken;
pub use dispatcher::{
    BatchDispatcher, BatchObserver, BatchOutcome, DispatchHandle, DispatchSettings, DrainReport,
};
