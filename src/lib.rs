// Core library for the geoimport geolocation bulk importer

pub mod cli;
pub mod config;
pub mod config_file;
pub mod decompression;
pub mod error;
pub mod parallel;
pub mod platform;
pub mod readers;
pub mod record;
pub mod schema;
pub mod stats;
pub mod store;
pub mod validate;

pub use error::{ImportError, StoreError};
pub use parallel::{ImportProcessor, ImportTracker, PipelineConfig};
pub use platform::CancelToken;
pub use record::{Batch, Field, Record};
pub use schema::{Column, ColumnMapping};
pub use stats::{RejectionCounts, RunSummary};
pub use store::{MemoryStore, RecordStore, SqliteOptions, SqliteStore};
pub use validate::{is_valid_ipv4, validate_line, Rejection};
