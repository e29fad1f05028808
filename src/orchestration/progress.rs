//! # Progress Notification
//!
//! Percent complete is the share of successful batches over all batches, floored. Status
//! listeners only hear about multiples of five, each value at most once, and never a value
//! lower than one already reported, no matter how concurrent workers interleave.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::listeners::{ListenerKind, ListenerRegistry};
use crate::constants::{status_messages, PROGRESS_NOTIFICATION_STEP};
use crate::models::BatchResult;

/// `floor(successful_batches / total_batches * 100)`; an empty job is complete
pub fn percent_complete(successful_batches: u64, total_batches: u64) -> u32 {
    if total_batches == 0 {
        return 100;
    }
    let percent = successful_batches.min(total_batches) * 100 / total_batches;
    percent as u32
}

/// Emits status-changed and item-level events for one job
pub struct ProgressNotifier {
    job_id: String,
    total_batches: u64,
    last_notified: AtomicU32,
    /// Held from advancing `last_notified` until its listeners return
    notify_order: Mutex<()>,
    listeners: Arc<ListenerRegistry>,
}

impl ProgressNotifier {
    pub fn new(
        job_id: impl Into<String>,
        total_batches: u64,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            total_batches,
            last_notified: AtomicU32::new(0),
            notify_order: Mutex::new(()),
            listeners,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn last_notified(&self) -> u32 {
        self.last_notified.load(Ordering::Acquire)
    }

    /// Announce that batches are about to be dispatched
    pub fn started(&self) {
        self.listeners
            .status_changed(&self.job_id, 0, status_messages::STARTING);
    }

    /// Re-evaluate progress after a batch; returns the percentage notified, if any
    pub fn batch_finished(&self, successful_batches: u64) -> Option<u32> {
        let percent = percent_complete(successful_batches, self.total_batches);
        if percent % PROGRESS_NOTIFICATION_STEP != 0 {
            return None;
        }
        let _order = self.notify_order.lock();
        if !self.advance_to(percent) {
            return None;
        }

        debug!(job_id = %self.job_id, percent, "Progress advanced");
        self.listeners
            .status_changed(&self.job_id, percent, status_messages::PROGRESS);
        Some(percent)
    }

    /// Report 100% unless a batch already did
    pub fn completed(&self) {
        let _order = self.notify_order.lock();
        if self.advance_to(100) {
            self.listeners
                .status_changed(&self.job_id, 100, status_messages::COMPLETE);
        }
    }

    /// Item-level events for one batch result
    pub fn items(&self, result: &BatchResult) {
        if self.listeners.has(ListenerKind::ItemCompleted) {
            for item in &result.completed_items {
                self.listeners.item_completed(&self.job_id, item);
            }
        }
        if self.listeners.has(ListenerKind::ItemFailed) {
            for item in &result.failed_items {
                self.listeners.item_failed(&self.job_id, item);
            }
        }
    }

    /// Every item of a batch that produced no result counts as failed
    pub fn items_failed<'a>(&self, items: impl IntoIterator<Item = &'a String>) {
        if self.listeners.has(ListenerKind::ItemFailed) {
            for item in items {
                self.listeners.item_failed(&self.job_id, item);
            }
        }
    }

    fn advance_to(&self, percent: u32) -> bool {
        self.last_notified
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |previous| {
                (percent > previous).then_some(percent)
            })
            .is_ok()
    }
}
