//! Thread-safe counters shared by the pipeline stages
//!
//! Stages fold their local counts in here once per unit of work (chunk,
//! admission, batch), so the tracker can be read for progress reports while
//! the run is still going.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::stats::ImportStats;
use crate::validate::ChunkOutcome;

#[derive(Debug)]
struct TrackerState {
    stats: ImportStats,
    start_time: Instant,
}

impl TrackerState {
    fn fresh() -> Self {
        Self {
            stats: ImportStats::default(),
            start_time: Instant::now(),
        }
    }
}

/// Thread-safe statistics tracker for an import run
///
/// Clones share the same counters. [`reset`](Self::reset) clears them in
/// place, so clones handed out earlier follow the next run.
#[derive(Debug, Clone)]
pub struct ImportTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl Default for ImportTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::fresh())),
        }
    }

    /// Lock state with poison recovery
    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("pipeline thread panicked, recovering import stats");
                poisoned.into_inner()
            }
        }
    }

    /// Zero every counter and restart the clock.
    pub(crate) fn reset(&self) {
        *self.lock_state() = TrackerState::fresh();
    }

    pub(crate) fn record_chunk_read(&self, bytes: usize) {
        let mut state = self.lock_state();
        let stats = &mut state.stats;
        stats.chunks_read += 1;
        stats.bytes_read += bytes as u64;
    }

    pub(crate) fn record_chunk_validated(&self, outcome: &ChunkOutcome) {
        let mut state = self.lock_state();
        let stats = &mut state.stats;
        stats.lines_total += outcome.lines;
        stats.rejections.merge(&outcome.rejections);
    }

    pub(crate) fn record_admissions(
        &self,
        admitted: u64,
        duplicate_ip: u64,
        duplicate_coordinates: u64,
    ) {
        let mut state = self.lock_state();
        let stats = &mut state.stats;
        stats.valid += admitted;
        stats.rejections.duplicate_ip += duplicate_ip;
        stats.rejections.duplicate_coordinates += duplicate_coordinates;
    }

    pub(crate) fn record_batch_persisted(&self, records: usize) {
        let mut state = self.lock_state();
        let stats = &mut state.stats;
        stats.batches_persisted += 1;
        stats.records_persisted += records as u64;
    }

    pub(crate) fn record_batch_failed(&self, records: usize) {
        let mut state = self.lock_state();
        let stats = &mut state.stats;
        stats.batches_failed += 1;
        stats.records_lost += records as u64;
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> ImportStats {
        self.lock_state().stats.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.lock_state().start_time.elapsed()
    }
}
