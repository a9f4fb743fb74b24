use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::StoreError;
use crate::record::{Batch, Record};

use super::RecordStore;

/// In-memory store that keeps every batch it is given.
///
/// Used for dry runs and tests. Batches can be made to fail by id, and a
/// per-call delay makes concurrent persists observable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Batch>>,
    discard: bool,
    record_count: AtomicUsize,
    failing_batches: HashSet<u64>,
    persist_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that only counts what it is given. Used for dry runs, where
    /// keeping a whole dump in memory would be wasteful.
    pub fn discarding() -> Self {
        Self {
            discard: true,
            ..Self::default()
        }
    }

    /// Fail `persist_batch` for the given batch ids.
    pub fn with_failing_batches(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.failing_batches.extend(ids);
        self
    }

    /// Sleep for `delay` inside every `persist_batch` call.
    pub fn with_persist_delay(mut self, delay: Duration) -> Self {
        self.persist_delay = Some(delay);
        self
    }

    fn lock_batches(&self) -> MutexGuard<'_, Vec<Batch>> {
        match self.batches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Persisted batches ordered by batch id.
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches = self.lock_batches().clone();
        batches.sort_by_key(|batch| batch.id);
        batches
    }

    /// Sizes of the persisted batches ordered by batch id.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches().iter().map(Batch::len).collect()
    }

    /// Every persisted record, in batch id order.
    pub fn records(&self) -> Vec<Record> {
        self.batches()
            .into_iter()
            .flat_map(|batch| batch.records)
            .collect()
    }

    /// Records accepted so far, including discarded ones.
    pub fn record_count(&self) -> usize {
        self.record_count.load(Ordering::SeqCst)
    }

    /// Highest number of `persist_batch` calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryStore {
    fn persist_batch(&self, batch: &Batch) -> Result<(), StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.persist_delay {
            thread::sleep(delay);
        }

        let result = if self.failing_batches.contains(&batch.id) {
            Err(StoreError::Injected { batch_id: batch.id })
        } else {
            self.record_count.fetch_add(batch.len(), Ordering::SeqCst);
            if !self.discard {
                self.lock_batches().push(batch.clone());
            }
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
