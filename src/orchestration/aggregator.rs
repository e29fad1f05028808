//! # Result Aggregation
//!
//! Lock-free counters for batch and item outcomes plus the bounded error buffer. Workers
//! update these concurrently in whatever order their batches finish; the completion
//! monitor reads them once after the dispatcher drains.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use crate::constants::MAX_ERROR_MESSAGES;
use crate::models::{Batch, BatchResult, JobCounts};

/// Error messages retained for the job output, dropping everything past capacity
#[derive(Debug)]
pub struct ErrorBuffer {
    capacity: usize,
    messages: Mutex<Vec<String>>,
}

impl ErrorBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Keep `message` if there is room; returns whether it was kept
    pub fn push(&self, message: impl Into<String>) -> bool {
        let mut messages = self.messages.lock();
        if messages.len() >= self.capacity {
            return false;
        }
        messages.push(message.into());
        true
    }

    /// Keep as many of `messages` as fit
    pub fn extend(&self, messages: impl IntoIterator<Item = String>) {
        let mut retained = self.messages.lock();
        let room = self.capacity.saturating_sub(retained.len());
        retained.extend(messages.into_iter().take(room));
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Default for ErrorBuffer {
    fn default() -> Self {
        Self::new(MAX_ERROR_MESSAGES)
    }
}

/// Shared outcome counters for one job
#[derive(Debug, Default)]
pub struct ResultAggregator {
    successful_events: AtomicU64,
    failed_events: AtomicU64,
    successful_batches: AtomicU64,
    failed_batches: AtomicU64,
    errors: ErrorBuffer,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a processor-reported result into the counters.
    ///
    /// Reported counts are clamped to the batch size so the job can never count more
    /// items than were collected. Returns the number of items counted as failed.
    pub fn record_result(&self, batch: &Batch, result: &BatchResult) -> u64 {
        let batch_len = batch.len() as u64;
        let total = result.total_count.min(batch_len);
        let failed = result.error_count.min(total);
        if total != result.total_count || failed != result.error_count {
            warn!(
                batch = batch.index,
                batch_len,
                reported_total = result.total_count,
                reported_errors = result.error_count,
                "Processor reported more items than the batch holds, clamping"
            );
        }

        self.failed_events.fetch_add(failed, Ordering::AcqRel);
        self.successful_events
            .fetch_add(total - failed, Ordering::AcqRel);

        if !result.errors.is_empty() {
            self.errors.extend(result.error_messages());
        }

        if failed < total {
            self.successful_batches.fetch_add(1, Ordering::AcqRel);
        } else {
            self.failed_batches.fetch_add(1, Ordering::AcqRel);
        }

        failed
    }

    /// Count a batch that produced no result: every item in it failed.
    /// Returns the number of items counted as failed.
    pub fn record_failure(&self, batch: &Batch, message: impl Into<String>) -> u64 {
        let failed = batch.len() as u64;
        self.failed_batches.fetch_add(1, Ordering::AcqRel);
        self.failed_events.fetch_add(failed, Ordering::AcqRel);
        self.errors.push(message);
        failed
    }

    pub fn successful_events(&self) -> u64 {
        self.successful_events.load(Ordering::Acquire)
    }

    pub fn failed_events(&self) -> u64 {
        self.failed_events.load(Ordering::Acquire)
    }

    pub fn successful_batches(&self) -> u64 {
        self.successful_batches.load(Ordering::Acquire)
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Acquire)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.snapshot()
    }

    pub fn counts(&self) -> JobCounts {
        JobCounts {
            success_count: self.successful_events(),
            failure_count: self.failed_events(),
            successful_batches: self.successful_batches(),
            failed_batches: self.failed_batches(),
        }
    }
}
