//! Cycle Log Processor CLI Application
//!
//! This is the command-line interface for the cycle log engine.
//! It uses the cycle-log-engine library and adds:
//! - Configuration document loading (JSON or TOML)
//! - Log file discovery and optional renaming
//! - CSV output
//! - Logging setup and the end-of-run summary

use anyhow::{Context, Result};
use clap::Parser;
use cycle_log_engine::{Processor, ReadMode, RunMetrics};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

mod config;
mod files;
mod output;
mod report;

use config::AppConfig;

/// Cycle Log Processor - Turn instrument logs into one CSV row per cycle
#[derive(Parser, Debug)]
#[command(name = "cycle-log-cli")]
#[command(about = "Process instrument logs into structured CSV", long_about = None)]
#[command(version)]
struct Args {
    /// Path to JSON configuration file (.toml selects TOML)
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Override output CSV file path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Read log files in parallel
    #[arg(long)]
    parallel: bool,

    /// Verbosity level (can be repeated: -v, -vv); overrides LOG_LEVEL
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let loaded = config::load_config(&args.config)?;
    let found = loaded.is_some();
    let mut app = loaded.unwrap_or_default();
    if let Some(output) = &args.output {
        app.output_csv = output.clone();
    }

    // Initialize logging
    let level = match (args.quiet, args.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => app.level_filter()?,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    init_logging(level, app.log_file.as_deref())?;

    log::info!("Cycle Log Processor v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", cycle_log_engine::VERSION);
    if !found {
        log::warn!("Config file not found: {:?}, using defaults.", args.config);
    }

    let compiled = app.validate().context("Invalid configuration")?;
    log::debug!("Configuration loaded successfully");

    let mode = if args.parallel || app.parallel_reads {
        ReadMode::Parallel
    } else {
        ReadMode::Sequential
    };
    process(&app, Processor::new(compiled), mode)
}

/// Rename, discover, process and save
fn process(app: &AppConfig, mut processor: Processor, mode: ReadMode) -> Result<()> {
    if app.rename_logs {
        files::rename_logs(&app.folder_path, &app.log_extensions, &app.new_ext)?;
    }

    let paths = files::gather_files(&app.folder_path, &app.log_extensions);
    if paths.is_empty() {
        log::warn!("No log files found.");
        return Ok(());
    }

    let mut metrics = RunMetrics::new();
    let records = processor.run(&paths, mode, &mut metrics);

    let saved = if records.is_empty() {
        log::warn!("No results to save.");
        0
    } else {
        output::save_results(&app.output_csv, &app.csv_fields, &records)?
    };

    report::print_summary(&metrics, saved).context("Failed to write summary")?;
    Ok(())
}

/// Writes every log line to stderr and to a file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialize logging at `level`, optionally copying output to `log_file`
fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    use env_logger::{Builder, Target};

    let mut builder = Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "{} [{} {}] {}",
            buf.timestamp_millis(),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }

    builder.init();
    Ok(())
}
