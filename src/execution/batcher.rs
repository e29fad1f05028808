use crate::collector::ItemQueue;
use crate::models::Batch;

/// Number of batches needed for `items` identifiers at `batch_size` per batch
pub fn batch_count(items: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    items.div_ceil(batch_size)
}

/// Cuts an item queue into consecutive fixed-size batches in source order
#[derive(Debug)]
pub struct Batcher {
    queue: ItemQueue,
    batch_size: usize,
    next_index: usize,
}

impl Batcher {
    /// `batch_size` must be greater than zero
    pub fn new(queue: ItemQueue, batch_size: usize) -> Self {
        debug_assert!(batch_size > 0, "batch size must be positive");
        Self {
            queue,
            batch_size,
            next_index: 0,
        }
    }

    /// Batches the queue will produce in total
    pub fn total_batches(&self) -> usize {
        batch_count(self.queue.len(), self.batch_size)
    }

    /// Batches handed out so far
    pub fn batches_taken(&self) -> usize {
        self.next_index
    }

    pub fn next_batch(&mut self) -> Option<Batch> {
        let items: Vec<String> = self.queue.by_ref().take(self.batch_size).collect();
        if items.is_empty() {
            return None;
        }

        let batch = Batch {
            index: self.next_index,
            items,
        };
        self.next_index += 1;
        Some(batch)
    }
}

impl Iterator for Batcher {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        self.next_batch()
    }
}
