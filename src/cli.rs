// Command-line interface definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SummaryFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "geoimport")]
#[command(about = "Bulk-import geolocation CSV dumps into SQLite")]
#[command(
    long_about = "Bulk-import geolocation CSV dumps into SQLite\n\nLines are validated in parallel, deduplicated by IP and by coordinates\n(first occurrence wins), and written in batches with bounded concurrency."
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<String>,

    /// Do not load any configuration file
    #[arg(long = "ignore-config", global = true)]
    pub ignore_config: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a CSV dump (plain, gzip or zstd) into the database
    Import(ImportArgs),
    /// Print the stored record for an IP address as JSON
    Lookup(LookupArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Input file ('-' for stdin)
    #[arg(value_name = "INPUT", default_value = "-")]
    pub input: String,

    /// SQLite database file
    #[arg(
        long = "database",
        value_name = "PATH",
        env = "GEOIMPORT_DATABASE",
        help_heading = "Storage Options"
    )]
    pub database: Option<PathBuf>,

    /// Delete existing records before importing
    #[arg(long = "truncate", help_heading = "Storage Options")]
    pub truncate: bool,

    /// Validate and deduplicate without writing anything
    #[arg(long = "dry-run", help_heading = "Storage Options", conflicts_with = "truncate")]
    pub dry_run: bool,

    /// Milliseconds a writer waits on a locked database
    #[arg(long = "busy-timeout-ms", value_name = "MS", help_heading = "Storage Options")]
    pub busy_timeout_ms: Option<u64>,

    /// Validator threads (default: number of CPUs)
    #[arg(long = "workers", value_name = "N", help_heading = "Pipeline Options")]
    pub workers: Option<usize>,

    /// Size of each input read, in KiB, before aligning to a line end
    #[arg(long = "chunk-kib", value_name = "N", help_heading = "Pipeline Options")]
    pub chunk_kib: Option<usize>,

    /// Records per database write
    #[arg(long = "batch-size", value_name = "N", help_heading = "Pipeline Options")]
    pub batch_size: Option<usize>,

    /// Capacity of the record queues between stages
    #[arg(long = "queue-capacity", value_name = "N", help_heading = "Pipeline Options")]
    pub queue_capacity: Option<usize>,

    /// Batches that may be written concurrently
    #[arg(long = "max-in-flight", value_name = "N", help_heading = "Pipeline Options")]
    pub max_in_flight: Option<usize>,

    /// Format of the run summary printed on stdout
    #[arg(
        long = "summary",
        value_enum,
        default_value_t = SummaryFormat::Text,
        help_heading = "Output Options"
    )]
    pub summary: SummaryFormat,
}

#[derive(Args, Debug, Clone)]
pub struct LookupArgs {
    /// IPv4 address to look up
    #[arg(value_name = "IP")]
    pub ip: String,

    /// SQLite database file
    #[arg(long = "database", value_name = "PATH", env = "GEOIMPORT_DATABASE")]
    pub database: Option<PathBuf>,
}
