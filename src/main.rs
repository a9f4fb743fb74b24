use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, FromArgMatches};
use tracing_subscriber::EnvFilter;

use geoimport::cli::{Cli, Command, ImportArgs, LookupArgs, SummaryFormat};
use geoimport::config::{ImportConfig, LookupConfig};
use geoimport::config_file::ConfigFile;
use geoimport::platform::{CancelToken, ExitCode, SafeStdout, SignalHandler};
use geoimport::readers::open_input;
use geoimport::{
    is_valid_ipv4, ImportError, ImportProcessor, MemoryStore, RunSummary, SqliteStore,
};

fn main() {
    let (cli, config_file) = process_args_with_config();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Command::Import(args) => run_import(args, &config_file),
        Command::Lookup(args) => run_lookup(args, &config_file),
    };

    match result {
        Ok(code) => code.exit(),
        Err(e) => {
            eprintln!("geoimport: Error: {:#}", e);
            ExitCode::GeneralError.exit();
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by -v/-q.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run_import(args: &ImportArgs, config_file: &ConfigFile) -> Result<ExitCode> {
    let config = ImportConfig::resolve(args, config_file)?;

    let cancel = CancelToken::new();
    let mut processor = ImportProcessor::new(config.pipeline.clone()).with_cancel_token(cancel.clone());
    let _signal_handler = SignalHandler::new(cancel, processor.tracker())
        .context("Failed to initialize signal handling")?;

    let (reader, compression) = open_input(&config.input)
        .with_context(|| format!("Failed to open input '{}'", config.input))?;
    tracing::info!(input = %config.input, ?compression, "reading dump");

    let result = if config.dry_run {
        let store = MemoryStore::discarding();
        processor.run(reader, &store)
    } else {
        let path = config
            .database
            .as_deref()
            .ok_or_else(|| anyhow!("no database given"))?;
        let store = SqliteStore::open(path, config.sqlite)
            .with_context(|| format!("Failed to open database '{}'", path.display()))?;
        if config.truncate {
            let removed = store.truncate().context("Failed to truncate existing records")?;
            tracing::info!(removed, database = %store.path().display(), "truncated existing records");
        }
        processor.run(reader, &store)
    };

    match result {
        Ok(summary) => {
            print_summary(&summary, config.summary)?;
            Ok(ExitCode::Success)
        }
        Err(ImportError::Cancelled { summary }) => {
            print_summary(&summary, config.summary)?;
            tracing::warn!("import cancelled before the input was exhausted");
            Ok(ExitCode::SignalInt)
        }
        Err(e) => Err(e).context("Import failed"),
    }
}

fn print_summary(summary: &RunSummary, format: SummaryFormat) -> Result<()> {
    let text = match format {
        SummaryFormat::Text => summary.format_summary(),
        SummaryFormat::Json => {
            serde_json::to_string_pretty(summary).context("Failed to encode summary as JSON")?
        }
    };
    SafeStdout::new().writeln(&text)
}

fn run_lookup(args: &LookupArgs, config_file: &ConfigFile) -> Result<ExitCode> {
    let config = LookupConfig::resolve(args, config_file)?;
    if !is_valid_ipv4(&config.ip) {
        return Err(anyhow!("'{}' is not a valid IPv4 address", config.ip));
    }
    if !config.database.exists() {
        return Err(anyhow!(
            "database '{}' does not exist",
            config.database.display()
        ));
    }

    let store = SqliteStore::open(&config.database, config.sqlite)
        .with_context(|| format!("Failed to open database '{}'", config.database.display()))?;
    let record = store
        .find_by_ip(&config.ip)
        .context("Lookup failed")?
        .ok_or_else(|| anyhow!("no record found for {}", config.ip))?;

    let json = serde_json::to_string_pretty(&record).context("Failed to encode record as JSON")?;
    SafeStdout::new().writeln(&json)?;
    Ok(ExitCode::Success)
}

/// Extract --config-file argument from raw args
fn extract_config_file_arg(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config-file" {
            return iter.next().cloned();
        }
        if let Some(value) = arg.strip_prefix("--config-file=") {
            return Some(value.to_string());
        }
    }
    None
}

/// Parse the command line after applying config file defaults.
fn process_args_with_config() -> (Cli, ConfigFile) {
    let raw_args: Vec<String> = std::env::args().collect();

    let config_file_path = extract_config_file_arg(&raw_args);
    let ignore_config = raw_args.iter().any(|arg| arg == "--ignore-config");

    let (config_file, processed_args) = if ignore_config {
        (ConfigFile::default(), raw_args)
    } else {
        let config_file = match ConfigFile::load_with_custom_path(config_file_path.as_deref()) {
            Ok(config_file) => config_file,
            Err(e) => {
                eprintln!("geoimport: Config file error: {:#}", e);
                ExitCode::GeneralError.exit();
            }
        };
        match config_file.process_args(raw_args) {
            Ok(processed) => (config_file, processed),
            Err(e) => {
                eprintln!("geoimport: Config error: {:#}", e);
                ExitCode::GeneralError.exit();
            }
        }
    };

    let matches = Cli::command().get_matches_from(processed_args);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    (cli, config_file)
}
