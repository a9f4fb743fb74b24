//! Persistence boundary for admitted records.
//!
//! The pipeline only needs one operation from a store: persist a sealed batch.
//! Transaction scope, schema, and connections belong to the implementation.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteOptions, SqliteStore, SQLITE_MAX_PARAMETERS};

use crate::error::StoreError;
use crate::record::Batch;

/// Bulk sink for admitted records.
///
/// `persist_batch` may be called from several threads at once, one call per
/// sealed batch. A failed call is reported and never retried.
pub trait RecordStore: Send + Sync {
    fn persist_batch(&self, batch: &Batch) -> Result<(), StoreError>;
}
