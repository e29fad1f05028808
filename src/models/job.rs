//! # Job Model
//!
//! One execution of a flow. The job record is created when `run()` starts, receives its id
//! once collection completes, and is written in its terminal form exactly once: either by
//! the collection-failure path or by the completion monitor after the dispatcher drains.
//! Workers never touch it; they only update shared counters the monitor reads at drain time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flow::Flow;
use crate::error::{FlowError, Result};
use crate::state_machine::JobStatus;

/// Aggregated outcome counts copied onto a job when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub success_count: u64,
    pub failure_count: u64,
    pub successful_batches: u64,
    pub failed_batches: u64,
}

/// Record of one flow execution, shaped the way persistence stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Assigned when collection completes
    pub id: Option<String>,
    pub flow: String,
    pub step: u32,
    pub status: JobStatus,
    #[serde(flatten)]
    pub counts: JobCounts,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Captured error messages, bounded by the aggregator
    pub output: Vec<String>,
}

impl Job {
    /// New job for `flow`, collecting items
    pub fn with_flow(flow: &Flow, step: u32) -> Self {
        Self {
            id: None,
            flow: flow.name.clone(),
            step,
            status: JobStatus::RunningCollector,
            counts: JobCounts::default(),
            start_time: Utc::now(),
            end_time: None,
            output: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition_to(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(FlowError::InvalidState(format!(
                "Job {} cannot move from {} to {}",
                self.id.as_deref().unwrap_or("<unassigned>"),
                self.status,
                next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Write the terminal state: status, counts, end time and any captured output
    pub fn finish(
        &mut self,
        status: JobStatus,
        counts: JobCounts,
        output: Vec<String>,
    ) -> Result<()> {
        self.transition_to(status)?;
        self.counts = counts;
        self.end_time = Some(Utc::now());
        if !output.is_empty() {
            self.output = output;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn success_count(&self) -> u64 {
        self.counts.success_count
    }

    pub fn failure_count(&self) -> u64 {
        self.counts.failure_count
    }
}
