//! Chunk reader thread
//!
//! Cuts the input into newline-aligned chunks and feeds them to the validator
//! pool. This is the only stage that touches the input stream.

use crossbeam_channel::Sender;
use std::io::BufRead;

use crate::error::ImportError;
use crate::platform::CancelToken;
use crate::readers::ChunkReader;

use super::tracker::ImportTracker;
use super::types::Chunk;

/// How the reader stopped when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    Exhausted,
    Cancelled,
}

/// Reader thread: sequentially reads chunks until input ends, the run is
/// cancelled, or a read fails.
///
/// Returning drops `chunk_sender`, which is how the validators learn that no
/// more work is coming. A read error is returned after the queue closes so
/// chunks already handed out still drain.
pub(crate) fn chunk_reader_thread<R: BufRead>(
    mut reader: ChunkReader<R>,
    chunk_sender: Sender<Chunk>,
    cancel: CancelToken,
    tracker: ImportTracker,
) -> Result<ReadOutcome, ImportError> {
    let mut chunk_id = 0u64;

    loop {
        if cancel.is_cancelled() {
            tracing::info!(chunks = chunk_id, "cancellation requested; reader stopping");
            return Ok(ReadOutcome::Cancelled);
        }

        let bytes = match reader.next_chunk() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(chunk_id, error = %err, "input read failed; stopping reader");
                return Err(err);
            }
        };

        tracker.record_chunk_read(bytes.len());
        if chunk_sender
            .send(Chunk {
                id: chunk_id,
                bytes,
            })
            .is_err()
        {
            tracing::error!(chunk_id, "validator pool hung up; stopping reader");
            break;
        }
        chunk_id += 1;
    }

    tracing::debug!(chunks = chunk_id, "input exhausted");
    Ok(ReadOutcome::Exhausted)
}
