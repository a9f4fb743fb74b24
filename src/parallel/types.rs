//! Type definitions for the import pipeline
//!
//! Contains the pipeline configuration and the messages passed between stages.

use crate::error::ImportError;
use crate::readers::DEFAULT_CHUNK_SIZE;

/// Records per bulk write. Budgeting eight parameters per row keeps a full
/// batch (65528 parameters) under the 65535 bind limit of common SQL servers.
pub const DEFAULT_BATCH_SIZE: usize = 8191;
/// Capacity of the record queues, the pipeline's backpressure point.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_IN_FLIGHT_BATCHES: usize = 4;

/// Validator threads and persist threads are each capped at this.
pub const MAX_THREADS: usize = 1024;
pub const MAX_CHUNK_SIZE: usize = 256 * 1024 * 1024;
pub const MAX_BATCH_SIZE: usize = 1_000_000;
pub const MAX_QUEUE_CAPACITY: usize = 10_000_000;

/// Configuration for the import pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Validator worker threads.
    pub workers: usize,
    /// Raw read size before line alignment, in bytes.
    pub chunk_size: usize,
    /// Records per sealed batch.
    pub batch_size: usize,
    /// Capacity of the candidate and admitted record queues.
    pub queue_capacity: usize,
    /// Batches that may be persisting at the same time.
    pub max_in_flight_batches: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight_batches: DEFAULT_MAX_IN_FLIGHT_BATCHES,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ImportError> {
        let checks = [
            (self.workers, "worker count"),
            (self.chunk_size, "chunk size"),
            (self.batch_size, "batch size"),
            (self.queue_capacity, "queue capacity"),
            (self.max_in_flight_batches, "max in-flight batches"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(ImportError::InvalidConfig {
                    reason: format!("{name} must be greater than 0"),
                });
            }
        }

        let limits = [
            (self.workers, MAX_THREADS, "worker count"),
            (self.chunk_size, MAX_CHUNK_SIZE, "chunk size"),
            (self.batch_size, MAX_BATCH_SIZE, "batch size"),
            (self.queue_capacity, MAX_QUEUE_CAPACITY, "queue capacity"),
            (self.max_in_flight_batches, MAX_THREADS, "max in-flight batches"),
        ];
        for (value, max, name) in limits {
            if value > max {
                return Err(ImportError::InvalidConfig {
                    reason: format!("{name} too high (max {max})"),
                });
            }
        }
        Ok(())
    }

    /// Capacity of the chunk queue between the reader and the validators.
    pub(crate) fn chunk_queue_capacity(&self) -> usize {
        self.workers * 2
    }
}

/// A newline-aligned block of raw input bytes.
#[derive(Debug)]
pub(crate) struct Chunk {
    pub id: u64,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.batch_size, 8191);
        assert_eq!(config.chunk_size, 500 * 1024);
        assert_eq!(config.queue_capacity, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = PipelineConfig {
            batch_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch size must be greater than 0"));

        let config = PipelineConfig {
            max_in_flight_batches: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upper_limits() {
        let within = PipelineConfig {
            workers: MAX_THREADS,
            chunk_size: MAX_CHUNK_SIZE,
            batch_size: MAX_BATCH_SIZE,
            queue_capacity: MAX_QUEUE_CAPACITY,
            max_in_flight_batches: MAX_THREADS,
        };
        assert!(within.validate().is_ok());

        let cases = [
            (
                PipelineConfig {
                    workers: MAX_THREADS + 1,
                    ..within.clone()
                },
                "worker count too high",
            ),
            (
                PipelineConfig {
                    chunk_size: MAX_CHUNK_SIZE + 1,
                    ..within.clone()
                },
                "chunk size too high",
            ),
            (
                PipelineConfig {
                    batch_size: usize::MAX / 2,
                    ..within.clone()
                },
                "batch size too high",
            ),
            (
                PipelineConfig {
                    queue_capacity: MAX_QUEUE_CAPACITY + 1,
                    ..within.clone()
                },
                "queue capacity too high",
            ),
            (
                PipelineConfig {
                    max_in_flight_batches: MAX_THREADS + 1,
                    ..within.clone()
                },
                "max in-flight batches too high",
            ),
        ];
        for (config, expected) in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ImportError::InvalidConfig { .. }));
            assert!(err.to_string().contains(expected), "{err}");
        }
    }
}
