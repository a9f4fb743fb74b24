//! Batch sink: seals admitted records into batches and persists them
//!
//! The sealer thread hands each batch over a rendezvous channel to a fixed
//! pool of persist workers. With no buffer between them, a batch only leaves
//! the sealer when a worker is free, which caps the batches being persisted
//! at the pool size.

use crossbeam_channel::{Receiver, Sender};

use crate::record::{Batch, Record};
use crate::store::RecordStore;

use super::tracker::ImportTracker;
use super::types::DEFAULT_BATCH_SIZE;

/// Collects records and seals them into batches of a fixed size.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    next_id: u64,
    open: Vec<Record>,
}

impl BatchAccumulator {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            next_id: 0,
            open: Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE)),
        }
    }

    /// Append a record; returns the sealed batch once it is full.
    pub fn push(&mut self, record: Record) -> Option<Batch> {
        self.open.push(record);
        if self.open.len() >= self.batch_size {
            Some(self.seal())
        } else {
            None
        }
    }

    /// Seal whatever is still open. `None` when nothing is pending.
    pub fn finish(&mut self) -> Option<Batch> {
        if self.open.is_empty() {
            None
        } else {
            Some(self.seal())
        }
    }

    fn seal(&mut self) -> Batch {
        let fresh = Vec::with_capacity(self.batch_size.min(DEFAULT_BATCH_SIZE));
        let records = std::mem::replace(&mut self.open, fresh);
        let batch = Batch::new(self.next_id, records);
        self.next_id += 1;
        batch
    }
}

/// Sealer thread: batches admitted records and hands batches to the persist
/// pool. The trailing partial batch is flushed when the admitted queue closes.
pub(crate) fn sink_thread(
    admitted_receiver: Receiver<Record>,
    batch_sender: Sender<Batch>,
    batch_size: usize,
) {
    let mut accumulator = BatchAccumulator::new(batch_size);
    let mut sealed = 0u64;

    while let Ok(record) = admitted_receiver.recv() {
        if let Some(batch) = accumulator.push(record) {
            if !dispatch(&batch_sender, batch) {
                return;
            }
            sealed += 1;
        }
    }

    if let Some(batch) = accumulator.finish() {
        tracing::debug!(batch_id = batch.id, size = batch.len(), "flushing final partial batch");
        if dispatch(&batch_sender, batch) {
            sealed += 1;
        }
    }

    tracing::debug!(batches = sealed, "batch sink finished");
}

fn dispatch(batch_sender: &Sender<Batch>, batch: Batch) -> bool {
    match batch_sender.send(batch) {
        Ok(()) => true,
        Err(err) => {
            let batch = err.into_inner();
            tracing::error!(
                batch_id = batch.id,
                size = batch.len(),
                "persist workers hung up; dropping batch"
            );
            false
        }
    }
}

/// Persist worker: writes one batch at a time until the batch queue closes.
///
/// A failed batch is logged and counted; its records are lost for this run.
pub(crate) fn persist_worker(
    worker_id: usize,
    batch_receiver: Receiver<Batch>,
    store: &dyn RecordStore,
    tracker: ImportTracker,
) {
    while let Ok(batch) = batch_receiver.recv() {
        match store.persist_batch(&batch) {
            Ok(()) => {
                tracing::debug!(worker_id, batch_id = batch.id, size = batch.len(), "batch persisted");
                tracker.record_batch_persisted(batch.len());
            }
            Err(err) => {
                tracing::warn!(
                    worker_id,
                    batch_id = batch.id,
                    size = batch.len(),
                    error = %err,
                    "failed to persist batch; records dropped"
                );
                tracker.record_batch_failed(batch.len());
            }
        }
    }
}
