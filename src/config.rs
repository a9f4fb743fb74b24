//! Resolved run configuration.
//!
//! Merges command-line arguments with the loaded config file. Command-line
//! values (including `GEOIMPORT_DATABASE`) win over the file.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{ImportArgs, LookupArgs, SummaryFormat};
use crate::config_file::ConfigFile;
use crate::parallel::PipelineConfig;
use crate::store::SqliteOptions;

const MISSING_DATABASE: &str =
    "no database given: pass --database, set GEOIMPORT_DATABASE, or set [database] path in the config file";

/// Everything an `import` run needs.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub input: String,
    /// `None` only for dry runs.
    pub database: Option<PathBuf>,
    pub sqlite: SqliteOptions,
    pub pipeline: PipelineConfig,
    pub truncate: bool,
    pub dry_run: bool,
    pub summary: SummaryFormat,
}

impl ImportConfig {
    pub fn resolve(args: &ImportArgs, file: &ConfigFile) -> Result<Self> {
        let database = args.database.clone().or_else(|| file.database_path.clone());
        if database.is_none() && !args.dry_run {
            return Err(anyhow!(MISSING_DATABASE));
        }

        let defaults = PipelineConfig::default();
        let chunk_size = match args.chunk_kib {
            Some(kib) => kib
                .checked_mul(1024)
                .ok_or_else(|| anyhow!("--chunk-kib {} is too large", kib))?,
            None => defaults.chunk_size,
        };
        let pipeline = PipelineConfig {
            workers: args.workers.unwrap_or(defaults.workers),
            chunk_size,
            batch_size: args.batch_size.unwrap_or(defaults.batch_size),
            queue_capacity: args.queue_capacity.unwrap_or(defaults.queue_capacity),
            max_in_flight_batches: args.max_in_flight.unwrap_or(defaults.max_in_flight_batches),
        };
        pipeline.validate().context("Invalid import options")?;

        Ok(Self {
            input: args.input.clone(),
            database,
            sqlite: sqlite_options(args.busy_timeout_ms, file),
            pipeline,
            truncate: args.truncate,
            dry_run: args.dry_run,
            summary: args.summary,
        })
    }
}

/// Everything a `lookup` needs.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub ip: String,
    pub database: PathBuf,
    pub sqlite: SqliteOptions,
}

impl LookupConfig {
    pub fn resolve(args: &LookupArgs, file: &ConfigFile) -> Result<Self> {
        let database = args
            .database
            .clone()
            .or_else(|| file.database_path.clone())
            .ok_or_else(|| anyhow!(MISSING_DATABASE))?;

        Ok(Self {
            ip: args.ip.trim().to_string(),
            database,
            sqlite: sqlite_options(None, file),
        })
    }
}

fn sqlite_options(cli_timeout_ms: Option<u64>, file: &ConfigFile) -> SqliteOptions {
    let defaults = SqliteOptions::default();
    SqliteOptions {
        busy_timeout: cli_timeout_ms
            .or(file.busy_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout),
    }
}
