use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::tracker::JobTracker;
use crate::execution::CancellationToken;
use crate::models::{Job, JobCounts};
use crate::state_machine::JobStatus;

/// Handle to a started (or already failed) job.
///
/// Cloning a ticket shares the same job; stopping through any clone stops the run.
#[derive(Clone)]
pub struct JobTicket {
    job_id: String,
    token: CancellationToken,
    job: Arc<RwLock<Job>>,
    tracker: Option<Arc<JobTracker>>,
}

impl JobTicket {
    pub(crate) fn new(job_id: String, token: CancellationToken, job: Arc<RwLock<Job>>) -> Self {
        Self {
            job_id,
            token,
            job,
            tracker: None,
        }
    }

    pub(crate) fn with_tracker(mut self, tracker: Arc<JobTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Ask the dispatcher to stop taking new batches. In-flight batches still finish.
    /// Returns `false` if a stop was already requested.
    pub fn stop(&self) -> bool {
        self.token.cancel()
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Snapshot of the job record
    pub fn job(&self) -> Job {
        self.job.read().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.job.read().status
    }

    /// Outcome counts so far. Live while batches are running, final once the job is.
    pub fn counts(&self) -> JobCounts {
        let job = self.job.read();
        match &self.tracker {
            Some(tracker) if !job.is_finished() => tracker.aggregator().counts(),
            _ => job.counts,
        }
    }
}

impl fmt::Debug for JobTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTicket")
            .field("job_id", &self.job_id)
            .field("status", &self.status())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
