//! Reusable record storage shared by producers and the consumer.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::record::Record;

/// Bounded lock-free pool of [`Record`] values.
///
/// Producers [`acquire`](Self::acquire) a record, fill it, and move it into the
/// queue; the consumer [`release`](Self::release)s it after every writer has
/// seen it. A record is always owned by exactly one party.
#[derive(Debug, Clone)]
pub struct RecordPool {
    slots: Arc<ArrayQueue<Record>>,
}

impl RecordPool {
    /// Creates a pool retaining at most `capacity` idle records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(ArrayQueue::new(capacity.max(1))),
        }
    }

    /// Takes an idle record, or allocates a new one when the pool is empty.
    #[must_use]
    pub fn acquire(&self) -> Record {
        self.slots.pop().unwrap_or_default()
    }

    /// Returns a record to the pool; it is dropped when the pool is full.
    pub fn release(&self, record: Record) {
        let _ = self.slots.push(record);
    }

    /// Number of idle records.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.slots.len()
    }

    /// Maximum number of idle records kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}
