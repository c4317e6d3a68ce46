//! vzdump-mirror - Main entry point
//!
//! Copies the newest Proxmox backups per machine to another directory.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use vzdump_mirror::config::{Config, Overrides};
use vzdump_mirror::transfer::progress::{format_bytes, format_duration};
use vzdump_mirror::{synchronize, utils};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source folder
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Destination folder
    #[arg(short, long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Count of backup files to keep per machine [default: 1]
    #[arg(short = 'c', long = "count", allow_negative_numbers = true)]
    count: Option<i64>,

    /// Rate limit in KB/s (0 is no limit) [default: 0]
    #[arg(short, long, allow_negative_numbers = true)]
    rate_limit: Option<i64>,

    /// Path to configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let json = args.json;
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = utils::logger::init(&config.log.level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&config, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Configuration file (if any) with command-line values on top
fn load_config(args: Args) -> Result<Config> {
    let config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    Ok(config.with_overrides(Overrides {
        source: args.source,
        destination: args.destination,
        keep: args.count,
        rate_limit_kbps: args.rate_limit,
        log_level: args.log_level,
    }))
}

fn run(config: &Config, json: bool) -> Result<()> {
    // Validate before touching any backup directory
    let options = config.sync_options()?;

    tracing::info!(
        "Starting vzdump-mirror v{}: {} -> {} (keep {}, {:?})",
        env!("CARGO_PKG_VERSION"),
        options.source.display(),
        options.destination.display(),
        options.keep,
        options.mode
    );

    if options.mode.is_throttled() {
        tracing::info!("Transfers limited to {} KB/s", config.mirror.rate_limit_kbps);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(synchronize(&options))?;

    tracing::info!(
        "Mirror complete: {} machines, {} copied, {} replaced, {} skipped, {} deleted, {} in {}",
        report.machines,
        report.copied_files,
        report.replaced_files,
        report.skipped_files,
        report.deleted_files,
        format_bytes(report.transferred_bytes),
        format_duration(Duration::from_secs(report.duration_secs))
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
