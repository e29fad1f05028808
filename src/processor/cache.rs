use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{BatchProcessor, ConnectionId, ProcessorError, ProcessorFactory};

/// Per-connection processor cache with atomic get-or-create.
///
/// Construction happens while the connection's map entry is held, so concurrent workers
/// asking for the same connection never build two processors for it.
pub struct ProcessorCache {
    factory: Arc<dyn ProcessorFactory>,
    processors: DashMap<ConnectionId, Arc<dyn BatchProcessor>>,
}

impl ProcessorCache {
    pub fn new(factory: Arc<dyn ProcessorFactory>) -> Self {
        Self {
            factory,
            processors: DashMap::new(),
        }
    }

    /// Processor bound to `connection`, created on first use
    pub fn get_or_create(
        &self,
        connection: &ConnectionId,
    ) -> Result<Arc<dyn BatchProcessor>, ProcessorError> {
        if let Some(processor) = self.processors.get(connection) {
            return Ok(Arc::clone(processor.value()));
        }

        match self.processors.entry(connection.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let processor = self.factory.create(connection)?;
                debug!(connection = %connection, "Created batch processor");
                entry.insert(Arc::clone(&processor));
                Ok(processor)
            }
        }
    }

    /// Number of distinct connections with a processor
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Drop every cached processor
    pub fn clear(&self) {
        self.processors.clear();
    }
}
