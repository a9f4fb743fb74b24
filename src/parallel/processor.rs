//! Main import processor
//!
//! Contains the ImportProcessor that wires the pipeline stages together and
//! turns their counters into a run summary.

use crossbeam_channel::bounded;
use std::io::BufRead;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Instant;
use tracing::Dispatch;

use crate::error::ImportError;
use crate::platform::CancelToken;
use crate::readers::ChunkReader;
use crate::schema::ColumnMapping;
use crate::stats::RunSummary;
use crate::store::RecordStore;

use super::batching::{chunk_reader_thread, ReadOutcome};
use super::dedup::dedup_thread;
use super::sink::{persist_worker, sink_thread};
use super::tracker::ImportTracker;
use super::types::PipelineConfig;
use super::worker::validator_thread;

/// Runs one import: reader, validator pool, deduplicator, batch sink and
/// persist pool, connected by bounded queues.
pub struct ImportProcessor {
    config: PipelineConfig,
    tracker: ImportTracker,
    cancel: CancelToken,
}

impl ImportProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            tracker: ImportTracker::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned token so the caller can stop the run.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Live counters, readable from any thread. The handle stays valid across
    /// runs; each run starts it from zero.
    pub fn tracker(&self) -> ImportTracker {
        self.tracker.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Import every data line of `reader` into `store`.
    ///
    /// Returns once input is exhausted and all validation, dedup and persist
    /// work has drained. A cancelled run drains the same way and reports its
    /// partial counts through [`ImportError::Cancelled`]; the cancellation is
    /// consumed by that run, so the processor can be run again.
    pub fn run<R>(&mut self, reader: R, store: &dyn RecordStore) -> Result<RunSummary, ImportError>
    where
        R: BufRead + Send,
    {
        self.config.validate()?;
        self.tracker.reset();
        let started = Instant::now();

        let mut reader = ChunkReader::new(reader, self.config.chunk_size);
        let header = reader.read_header()?;
        let mapping = ColumnMapping::from_header(&header);
        if !mapping.is_complete() {
            tracing::warn!(
                columns = mapping.len(),
                unknown = ?mapping.unknown_columns(),
                "header does not map every field exactly once; affected lines will be rejected"
            );
        }

        tracing::info!(
            workers = self.config.workers,
            chunk_size = self.config.chunk_size,
            batch_size = self.config.batch_size,
            queue_capacity = self.config.queue_capacity,
            max_in_flight_batches = self.config.max_in_flight_batches,
            "starting import"
        );

        let dispatch = tracing::dispatcher::get_default(|current| current.clone());

        let (chunk_sender, chunk_receiver) = bounded(self.config.chunk_queue_capacity());
        let (candidate_sender, candidate_receiver) = bounded(self.config.queue_capacity);
        let (admitted_sender, admitted_receiver) = bounded(self.config.queue_capacity);
        // Rendezvous: a batch leaves the sealer only when a persist worker takes it.
        let (batch_sender, batch_receiver) = bounded(0);

        let (read_result, panicked) = thread::scope(|scope| {
            let reader_handle = {
                let cancel = self.cancel.clone();
                let tracker = self.tracker.clone();
                spawn_stage(scope, &dispatch, move || {
                    chunk_reader_thread(reader, chunk_sender, cancel, tracker)
                })
            };

            let mapping = &mapping;
            let validator_handles: Vec<_> = (0..self.config.workers)
                .map(|worker_id| {
                    let chunk_receiver = chunk_receiver.clone();
                    let candidate_sender = candidate_sender.clone();
                    let tracker = self.tracker.clone();
                    spawn_stage(scope, &dispatch, move || {
                        validator_thread(worker_id, chunk_receiver, candidate_sender, mapping, tracker)
                    })
                })
                .collect();
            drop(chunk_receiver);
            drop(candidate_sender);

            let dedup_handle = {
                let tracker = self.tracker.clone();
                spawn_stage(scope, &dispatch, move || {
                    dedup_thread(candidate_receiver, admitted_sender, tracker)
                })
            };

            let batch_size = self.config.batch_size;
            let sink_handle = spawn_stage(scope, &dispatch, move || {
                sink_thread(admitted_receiver, batch_sender, batch_size)
            });

            let persist_handles: Vec<_> = (0..self.config.max_in_flight_batches)
                .map(|worker_id| {
                    let batch_receiver = batch_receiver.clone();
                    let tracker = self.tracker.clone();
                    spawn_stage(scope, &dispatch, move || {
                        persist_worker(worker_id, batch_receiver, store, tracker)
                    })
                })
                .collect();
            drop(batch_receiver);

            // Join everything, even after a panic, so no stage outlives the scope.
            let mut panicked = None;
            let read_result = join_stage(reader_handle, "chunk reader", &mut panicked);
            for handle in validator_handles {
                join_stage(handle, "line validator", &mut panicked);
            }
            join_stage(dedup_handle, "deduplicator", &mut panicked);
            join_stage(sink_handle, "batch sink", &mut panicked);
            for handle in persist_handles {
                join_stage(handle, "persist worker", &mut panicked);
            }
            (read_result, panicked)
        });

        if let Some(stage) = panicked {
            return Err(ImportError::StagePanicked { stage });
        }

        let summary = self.tracker.snapshot().into_summary(started.elapsed());
        let outcome = match read_result {
            Some(result) => result?,
            None => return Err(ImportError::StagePanicked { stage: "chunk reader" }),
        };

        tracing::info!(
            lines = summary.lines_total,
            valid = summary.valid,
            invalid = summary.invalid,
            batches_persisted = summary.batches_persisted,
            batches_failed = summary.batches_failed,
            records_lost = summary.records_lost,
            elapsed = ?summary.elapsed,
            "import finished"
        );

        match outcome {
            ReadOutcome::Exhausted => Ok(summary),
            ReadOutcome::Cancelled => {
                self.cancel.reset();
                Err(ImportError::Cancelled {
                    summary: Box::new(summary),
                })
            }
        }
    }
}

/// Spawn a pipeline stage with the caller's tracing dispatcher installed.
fn spawn_stage<'scope, 'env, F, T>(
    scope: &'scope Scope<'scope, 'env>,
    dispatch: &Dispatch,
    stage: F,
) -> ScopedJoinHandle<'scope, T>
where
    F: FnOnce() -> T + Send + 'scope,
    T: Send + 'scope,
{
    let dispatch = dispatch.clone();
    scope.spawn(move || tracing::dispatcher::with_default(&dispatch, stage))
}

/// Join a stage, remembering the first one that panicked.
fn join_stage<T>(
    handle: ScopedJoinHandle<'_, T>,
    stage: &'static str,
    panicked: &mut Option<&'static str>,
) -> Option<T> {
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!(stage, "pipeline stage panicked");
            panicked.get_or_insert(stage);
            None
        }
    }
}
