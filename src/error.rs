//! Error types produced by the import pipeline and its stores.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::stats::RunSummary;

/// Errors that abort an import run.
///
/// Per-line validation failures and duplicates are never reported here; they
/// are counted in the [`RunSummary`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    /// The input had no header line.
    #[error("input is empty or has no header line")]
    MissingHeader,
    /// Reading the input failed mid-stream.
    #[error("failed to read input: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    /// The pipeline configuration was rejected before starting.
    #[error("invalid pipeline configuration: {reason}")]
    InvalidConfig { reason: String },
    /// The run was cancelled; the summary holds the work completed so far.
    #[error("import cancelled after {} valid records", summary.valid)]
    Cancelled { summary: Box<RunSummary> },
    /// A pipeline thread panicked.
    #[error("pipeline stage '{stage}' panicked")]
    StagePanicked { stage: &'static str },
}

/// Errors raised by a record store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Failed to create the parent directory for the database file.
    #[error("failed to create parent directory {path:?}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    /// Creating or configuring the schema failed.
    #[error("failed to prepare the geolocations schema")]
    Schema {
        #[source]
        source: rusqlite::Error,
    },
    /// Beginning a batch transaction failed.
    #[error("failed to begin transaction for batch {batch_id}")]
    BeginTransaction {
        batch_id: u64,
        #[source]
        source: rusqlite::Error,
    },
    /// Preparing an insert statement failed.
    #[error("failed to prepare insert statement for batch {batch_id}")]
    Prepare {
        batch_id: u64,
        #[source]
        source: rusqlite::Error,
    },
    /// Executing an insert failed.
    #[error("failed to insert records of batch {batch_id}")]
    Insert {
        batch_id: u64,
        #[source]
        source: rusqlite::Error,
    },
    /// Committing a batch transaction failed.
    #[error("failed to commit batch {batch_id}")]
    Commit {
        batch_id: u64,
        #[source]
        source: rusqlite::Error,
    },
    /// A read or maintenance query failed.
    #[error("query failed: {what}")]
    Query {
        what: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    /// Failure configured on an in-memory store.
    #[error("injected failure for batch {batch_id}")]
    Injected { batch_id: u64 },
}
