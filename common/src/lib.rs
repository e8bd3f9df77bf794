//! Container migration engine shared by the `rxfer` tools
//!
//! This crate implements one-way migration of the contents of a source
//! object-store container into a destination container:
//!
//! - a listing of the source feeds a queue of per-object transfer tasks,
//! - a bounded pool of workers drains the queue concurrently,
//! - each worker stages an object locally, consults the checksum gate to
//!   skip unchanged objects, and pushes changed ones through a shared
//!   bandwidth limiter, retrying transient failures with exponential
//!   backoff,
//! - once the pool drains, the verifier reconciles source and destination
//!   object counts and produces the final report.
//!
//! The object-store protocols themselves are out of scope: the engine is
//! written against the [`store::SourceStore`] and [`store::DestinationStore`]
//! traits (opaque list/fetch/head/put/count capabilities). A filesystem
//! backed implementation ships for local use; an in-memory implementation
//! backs the tests.
//!
//! Per-object failures stay local to their task. Only environmental errors
//! (expired credentials, a vanished destination container) escalate to
//! pool-wide cancellation, which stops dispatching new tasks and lets
//! in-flight transfers finish or fail on their own.

pub mod checksum;
pub mod config;
pub mod eventlog;
pub mod migrate;
pub mod object;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod store;
pub mod transfer;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutils;

pub use config::{MigrateSettings, OutputConfig, RuntimeConfig};
pub use migrate::{Outcome, migrate};

/// Bootstrap the tokio runtime and tracing, then drive `func` to completion.
///
/// Returns `None` when `func` fails (the caller maps this onto its exit
/// status); on success the result is printed when `output.print_summary`
/// is set and handed back to the caller.
pub fn run<F, Fut, T>(output: &OutputConfig, runtime: &RuntimeConfig, func: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
    T: std::fmt::Display,
{
    let level = match output.verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // logs go to stderr so stdout stays clean for summaries and reports
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let runtime = match builder.enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            if !output.quiet {
                tracing::error!("failed to start the async runtime: {error:#}");
            }
            return None;
        }
    };
    match runtime.block_on(func()) {
        Ok(value) => {
            if output.print_summary {
                println!("{value}");
            }
            Some(value)
        }
        Err(error) => {
            if !output.quiet {
                tracing::error!("{error:#}");
            }
            None
        }
    }
}
