//! Validator worker thread
//!
//! Workers take whole chunks, validate every line against the shared column
//! mapping and forward candidate records to the deduplicator.

use crossbeam_channel::{Receiver, Sender};

use crate::record::Record;
use crate::schema::ColumnMapping;
use crate::validate::validate_chunk;

use super::tracker::ImportTracker;
use super::types::Chunk;

/// Worker thread: validates chunks until the chunk queue closes.
///
/// Blocks only on the candidate queue when the deduplicator falls behind.
pub(crate) fn validator_thread(
    worker_id: usize,
    chunk_receiver: Receiver<Chunk>,
    candidate_sender: Sender<Record>,
    mapping: &ColumnMapping,
    tracker: ImportTracker,
) {
    let mut chunks = 0u64;

    while let Ok(chunk) = chunk_receiver.recv() {
        let result = validate_chunk(&chunk.bytes, mapping, |record| {
            candidate_sender.send(record).map_err(|_| ())
        });

        match result {
            Ok(outcome) => {
                tracing::trace!(
                    worker_id,
                    chunk_id = chunk.id,
                    lines = outcome.lines,
                    accepted = outcome.accepted,
                    "chunk validated"
                );
                tracker.record_chunk_validated(&outcome);
                chunks += 1;
            }
            Err(()) => {
                tracing::error!(
                    worker_id,
                    chunk_id = chunk.id,
                    "deduplicator hung up; stopping worker"
                );
                return;
            }
        }
    }

    tracing::debug!(worker_id, chunks, "validator finished");
}
