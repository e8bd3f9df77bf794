use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rxfer",
    version,
    about = "Migrate the contents of one object container into another - skips unchanged objects, retries transient failures, throttles aggregate bandwidth",
    long_about = "`rxfer` copies every object of a source container into a destination container, \
preserving the key hierarchy.

Objects whose content fingerprint already matches the destination are skipped, so re-running \
an interrupted migration only transfers what is missing or changed. Transient per-object \
failures are retried with exponential backoff; a bounded worker pool and a global bandwidth \
ceiling keep the load predictable. After the transfer, source and destination object counts \
are reconciled and reported.

Containers are local directories for this tool; the engine underneath is store-agnostic.

EXIT CODES:
    0 - All objects transferred or skipped, reconciliation matched
    1 - Some objects failed or reconciliation found a count mismatch
    2 - Fatal error (missing destination, invalid settings, listing failure)

EXAMPLES:
    # Migrate a container with 8 workers and progress updates
    rxfer /data/photos /archive/photos --max-workers 8 --progress --summary

    # Cap aggregate throughput at 50 MB/s
    rxfer /data/photos /archive/photos --bandwidth-limit 50

    # Re-run later: unchanged objects are skipped
    rxfer /data/photos /archive/photos --summary"
)]
struct Args {
    /// Source container to migrate from
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Destination container to migrate into (must already exist)
    #[arg(value_name = "DESTINATION")]
    destination: String,

    // Transfer options
    /// Number of concurrent transfer workers
    #[arg(
        long,
        default_value = "4",
        value_name = "N",
        help_heading = "Transfer options"
    )]
    max_workers: usize,

    /// Aggregate bandwidth ceiling in MB/s across all workers (0 = unlimited)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Transfer options"
    )]
    bandwidth_limit: u64,

    /// Maximum attempts per retryable object operation
    #[arg(
        long,
        default_value = "3",
        value_name = "N",
        help_heading = "Transfer options"
    )]
    max_attempts: u32,

    /// Region identifier recorded with the run
    #[arg(
        long,
        default_value = "local",
        value_name = "NAME",
        help_heading = "Transfer options"
    )]
    region: String,

    /// Directory objects are staged into while in flight
    ///
    /// Defaults to a destination-derived directory under the system temp
    /// dir. The directory is removed when the run finishes.
    #[arg(long, value_name = "PATH", help_heading = "Transfer options")]
    staging_dir: Option<std::path::PathBuf>,

    // Progress & output
    /// Directory the per-run transfer log is written into
    #[arg(
        long,
        default_value = ".",
        value_name = "PATH",
        help_heading = "Progress & output"
    )]
    log_dir: std::path::PathBuf,

    /// Disable the transfer log file
    #[arg(long, help_heading = "Progress & output")]
    no_log: bool,

    /// Show periodic progress on stderr
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Delay between progress updates (e.g. "500ms", "10s")
    #[arg(
        long,
        default_value = "10s",
        value_name = "DELAY",
        help_heading = "Progress & output"
    )]
    progress_delay: String,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Print the final reconciliation report as JSON to stdout
    #[arg(long, help_heading = "Progress & output")]
    json: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of runtime worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    runtime_threads: usize,

    /// Number of blocking worker threads (0 = Tokio default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,
}

fn default_staging_dir(destination: &str) -> std::path::PathBuf {
    let sanitized: String = destination
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    std::env::temp_dir().join(format!("rxfer-{sanitized}"))
}

async fn async_main(args: Args) -> anyhow::Result<common::Outcome> {
    let settings = common::MigrateSettings {
        source_container: args.source.clone(),
        dest_bucket: args.destination.clone(),
        region: args.region.clone(),
        concurrency: args.max_workers,
        bandwidth_limit_mbps: args.bandwidth_limit,
        max_attempts: args.max_attempts,
        staging_dir: args
            .staging_dir
            .clone()
            .unwrap_or_else(|| default_staging_dir(&args.destination)),
    };
    let log = if args.no_log {
        common::eventlog::EventLog::disabled()
    } else {
        let (log, log_path) = common::eventlog::EventLog::create(
            &args.log_dir,
            &args.source,
            &args.destination,
            &args.region,
        )
        .await?;
        tracing::info!("transfer log: {log_path:?}");
        log
    };
    let progress = Arc::new(common::progress::Progress::new());
    let printer_handle = if args.progress {
        let delay = humantime::parse_duration(&args.progress_delay)
            .with_context(|| format!("invalid --progress-delay {:?}", args.progress_delay))?;
        let mut printer = common::progress::ProgressPrinter::new(progress.clone());
        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                eprintln!("{}", printer.print());
            }
        }))
    } else {
        None
    };
    let retry = common::retry::RetryPolicy::with_max_attempts(args.max_attempts);
    let store = common::store::fs::FsStore::new();
    let outcome = common::migrate(
        Arc::new(store),
        Arc::new(store),
        settings,
        retry,
        log,
        progress,
    )
    .await;
    if let Some(handle) = printer_handle {
        handle.abort();
    }
    let outcome = outcome?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }
    Ok(outcome)
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.runtime_threads,
        max_blocking_threads: args.max_blocking_threads,
    };
    match common::run(&output, &runtime, func) {
        Some(outcome) if outcome.fully_successful() => std::process::ExitCode::SUCCESS,
        Some(_) => std::process::ExitCode::from(1),
        None => std::process::ExitCode::from(2),
    }
}
