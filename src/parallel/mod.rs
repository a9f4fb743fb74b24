//! Parallel import pipeline
//!
//! One reader thread cuts the input into chunks, a pool of validator workers
//! turns lines into candidate records, a single deduplicator admits them, and
//! the batch sink persists admitted records with bounded concurrency.
//!
//! # Module Structure
//!
//! - `types`: Pipeline configuration and inter-stage messages
//! - `tracker`: Thread-safe run counters
//! - `batching`: Chunk reader thread
//! - `worker`: Line validator workers
//! - `dedup`: Single-owner deduplication stage
//! - `sink`: Batch sealing and persist workers
//! - `processor`: ImportProcessor orchestration

mod batching;
mod dedup;
mod processor;
mod sink;
mod tracker;
mod types;
mod worker;

// Re-export public types
pub use dedup::{Admission, Deduplicator};
pub use processor::ImportProcessor;
pub use sink::BatchAccumulator;
pub use tracker::ImportTracker;
pub use types::{
    PipelineConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_IN_FLIGHT_BATCHES, DEFAULT_QUEUE_CAPACITY,
    MAX_BATCH_SIZE, MAX_CHUNK_SIZE, MAX_QUEUE_CAPACITY, MAX_THREADS,
};
