//! # Flow Listeners
//!
//! One ordered registry holds every listener of a runner. Each registration is one of four
//! kinds; notifications walk the registry in insertion order and call the listeners of
//! the matching kind. Registering the same callback twice means it is called twice.

use std::fmt;
use std::sync::Arc;

/// `(job_id, item)` for completed or failed items
pub type ItemCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// `(job_id, percent_complete, message)`
pub type StatusCallback = Arc<dyn Fn(&str, u32, &str) + Send + Sync>;

pub type FinishedCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    ItemCompleted,
    ItemFailed,
    StatusChanged,
    Finished,
}

/// A single listener registration
#[derive(Clone)]
pub enum FlowListener {
    ItemCompleted(ItemCallback),
    ItemFailed(ItemCallback),
    StatusChanged(StatusCallback),
    Finished(FinishedCallback),
}

impl FlowListener {
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::ItemCompleted(_) => ListenerKind::ItemCompleted,
            Self::ItemFailed(_) => ListenerKind::ItemFailed,
            Self::StatusChanged(_) => ListenerKind::StatusChanged,
            Self::Finished(_) => ListenerKind::Finished,
        }
    }
}

impl fmt::Debug for FlowListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowListener::{:?}", self.kind())
    }
}

/// Insertion-ordered listener registrations for one runner
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    listeners: Vec<FlowListener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: FlowListener) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Whether at least one listener of `kind` is registered
    pub fn has(&self, kind: ListenerKind) -> bool {
        self.listeners.iter().any(|listener| listener.kind() == kind)
    }

    pub fn item_completed(&self, job_id: &str, item: &str) {
        for listener in &self.listeners {
            if let FlowListener::ItemCompleted(callback) = listener {
                callback(job_id, item);
            }
        }
    }

    pub fn item_failed(&self, job_id: &str, item: &str) {
        for listener in &self.listeners {
            if let FlowListener::ItemFailed(callback) = listener {
                callback(job_id, item);
            }
        }
    }

    pub fn status_changed(&self, job_id: &str, percent_complete: u32, message: &str) {
        for listener in &self.listeners {
            if let FlowListener::StatusChanged(callback) = listener {
                callback(job_id, percent_complete, message);
            }
        }
    }

    pub fn finished(&self) {
        for listener in &self.listeners {
            if let FlowListener::Finished(callback) = listener {
                callback();
            }
        }
    }
}
