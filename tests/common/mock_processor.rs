//! Mock batch processors for exercising the runner without a remote endpoint.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flow_runner::collector::{CollectionError, ItemQueue, ItemSource};
use flow_runner::models::{BatchRequest, BatchResult};
use flow_runner::orchestration::FlowRunner;
use flow_runner::processor::{BatchProcessor, ConnectionId, ProcessorError, ProcessorFactory};
use flow_runner::{Flow, VecItemSource};

/// How a [`MockProcessor`] answers each batch
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Every item completes
    Succeed,
    /// These items fail with an error payload, the rest complete
    FailItems(HashSet<String>),
    /// Every item fails with an error payload
    FailAll,
    /// The remote call fails for any batch holding this item
    InvocationErrorOn(String),
}

/// Processor that answers according to a [`Behavior`] and records every request
pub struct MockProcessor {
    connection: ConnectionId,
    behavior: Behavior,
    delay: Option<Duration>,
    requests: Mutex<Vec<BatchRequest>>,
}

impl MockProcessor {
    pub fn new(connection: ConnectionId, behavior: Behavior, delay: Option<Duration>) -> Self {
        Self {
            connection,
            behavior,
            delay,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().clone()
    }

    pub fn connection(&self) -> &ConnectionId {
        &self.connection
    }
}

impl BatchProcessor for MockProcessor {
    fn run(&self, request: &BatchRequest) -> Result<BatchResult, ProcessorError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let items: Vec<String> = request.items().into_iter().map(String::from).collect();
        let failing: HashSet<String> = match &self.behavior {
            Behavior::Succeed => HashSet::new(),
            Behavior::FailItems(failing) => failing.clone(),
            Behavior::FailAll => items.iter().cloned().collect(),
            Behavior::InvocationErrorOn(item) => {
                if items.contains(item) {
                    return Err(ProcessorError::Invocation(format!(
                        "endpoint rejected batch holding {item}"
                    )));
                }
                HashSet::new()
            }
        };

        let (failed_items, completed_items): (Vec<String>, Vec<String>) =
            items.iter().cloned().partition(|item| failing.contains(item));

        Ok(BatchResult {
            total_count: items.len() as u64,
            error_count: failed_items.len() as u64,
            errors: failed_items
                .iter()
                .map(|item| json!({ "uri": item, "message": "validation failed" }))
                .collect(),
            completed_items,
            failed_items,
        })
    }
}

/// Factory handing out one [`MockProcessor`] per connection and counting creations
pub struct MockFactory {
    behavior: Behavior,
    delay: Option<Duration>,
    broken_connections: HashSet<String>,
    creations: AtomicUsize,
    processors: Mutex<HashMap<ConnectionId, Arc<MockProcessor>>>,
}

impl MockFactory {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            broken_connections: HashSet::new(),
            creations: AtomicUsize::new(0),
            processors: Mutex::new(HashMap::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(Behavior::Succeed)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Creating a processor for this connection fails with an infrastructure error
    pub fn with_broken_connection(mut self, connection: &str) -> Self {
        self.broken_connections.insert(connection.to_string());
        self
    }

    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn processor(&self, connection: &str) -> Option<Arc<MockProcessor>> {
        self.processors
            .lock()
            .get(&ConnectionId::new(connection))
            .cloned()
    }

    /// Every request seen by any processor, in no particular order
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.processors
            .lock()
            .values()
            .flat_map(|processor| processor.requests())
            .collect()
    }
}

impl ProcessorFactory for MockFactory {
    fn create(&self, connection: &ConnectionId) -> Result<Arc<dyn BatchProcessor>, ProcessorError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        if self.broken_connections.contains(connection.as_str()) {
            return Err(ProcessorError::Infrastructure(format!(
                "no client for connection {connection}"
            )));
        }

        let processor = Arc::new(MockProcessor::new(
            connection.clone(),
            self.behavior.clone(),
            self.delay,
        ));
        self.processors
            .lock()
            .insert(connection.clone(), Arc::clone(&processor));
        Ok(processor)
    }
}

/// Item source whose query always fails
pub struct FailingSource;

impl ItemSource for FailingSource {
    fn collect(&self, flow_name: &str, step: u32) -> Result<ItemQueue, CollectionError> {
        Err(CollectionError::Query {
            flow: flow_name.to_string(),
            step,
            reason: "collector endpoint returned 500".to_string(),
        })
    }
}

/// Ordered record of listener notifications
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }

    /// Percentages reported to status listeners, in notification order
    pub fn percents(&self) -> Vec<u32> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| event.strip_prefix("status:"))
            .filter_map(|rest| rest.split(':').next())
            .filter_map(|percent| percent.parse().ok())
            .collect()
    }
}

pub fn item_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("/item/{i}.json")).collect()
}

/// Runner over `count` generated items with every listener wired into `log`
pub fn logged_runner(count: usize, factory: Arc<MockFactory>, log: &EventLog) -> FlowRunner {
    let (completed, failed) = (log.clone(), log.clone());
    let (status, finished) = (log.clone(), log.clone());
    FlowRunner::new(Arc::new(VecItemSource::new(item_ids(count))), factory)
        .with_flow(Arc::new(Flow::new("customers")))
        .on_item_complete(move |_, item| completed.push(format!("completed:{item}")))
        .on_item_failed(move |_, item| failed.push(format!("failed:{item}")))
        .on_status_changed(move |_, percent, message| {
            status.push(format!("status:{percent}:{message}"))
        })
        .on_finished(move || finished.push("finished"))
}
