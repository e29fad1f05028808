//! # Data Models
//!
//! The records a flow run produces and consumes: the flow definition, the job record,
//! and the request/response shapes exchanged with the batch processor.

pub mod batch;
pub mod flow;
pub mod job;

pub use batch::{Batch, BatchRequest, BatchResult};
pub use flow::{Flow, FlowStep};
pub use job::{Job, JobCounts};
