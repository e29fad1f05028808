//! # Job Persistence
//!
//! Optional storage for job records. The runner saves a job once it has an id, when
//! dispatch starts, and again in its terminal state. Storage failures are logged by the
//! runner and never change the outcome of a run.

use dashmap::DashMap;

use crate::models::Job;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("Job has no id yet and cannot be stored")]
    MissingId,

    #[error("Job storage failed: {0}")]
    Storage(String),
}

/// Durable home for job records
pub trait JobStore: Send + Sync {
    /// Insert or replace the record for `job`
    fn save(&self, job: &Job) -> Result<(), PersistenceError>;

    fn find(&self, job_id: &str) -> Result<Option<Job>, PersistenceError>;
}

/// Process-local job store
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl JobStore for InMemoryJobStore {
    fn save(&self, job: &Job) -> Result<(), PersistenceError> {
        let id = job.id.clone().ok_or(PersistenceError::MissingId)?;
        self.jobs.insert(id, job.clone());
        Ok(())
    }

    fn find(&self, job_id: &str) -> Result<Option<Job>, PersistenceError> {
        Ok(self.jobs.get(job_id).map(|job| job.value().clone()))
    }
}
