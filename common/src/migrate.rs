//! One full migration run: preflight, listing, pool, reconciliation.

use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result, anyhow};
use tracing::instrument;

use crate::config::MigrateSettings;
use crate::eventlog::EventLog;
use crate::object::{TransferResult, build_tasks};
use crate::pool;
use crate::progress::Progress;
use crate::retry::RetryPolicy;
use crate::store::{DestinationStore, SourceStore};
use crate::transfer::{Context, Summary};
use crate::verify::{self, Report};

/// Everything a run produced. `Display` renders the end-of-run summary the
/// CLI prints with `--summary`.
#[derive(Debug)]
pub struct Outcome {
    pub results: Vec<TransferResult>,
    pub summary: Summary,
    pub report: Report,
}

impl Outcome {
    /// True when every object reached a good terminal state and the
    /// reconciliation matched; drives the process exit status.
    #[must_use]
    pub fn fully_successful(&self) -> bool {
        self.summary.objects_failed == 0 && self.report.matched
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}\n\n{}", self.summary, self.report)
    }
}

/// Migrate the source container's contents into the destination.
///
/// Fatal conditions (invalid settings, missing destination, a failed
/// listing) surface as errors before any transfer starts. Per-object
/// failures never do - they land in the outcome's results and report.
#[instrument(skip_all, fields(source = %settings.source_container, destination = %settings.dest_bucket))]
pub async fn migrate(
    source: Arc<dyn SourceStore>,
    destination: Arc<dyn DestinationStore>,
    settings: MigrateSettings,
    retry: RetryPolicy,
    log: EventLog,
    progress: Arc<Progress>,
) -> Result<Outcome> {
    settings.validate().map_err(|reason| anyhow!(reason))?;
    // preflight: a missing destination aborts before any task executes
    let destination_exists = destination
        .exists(&settings.dest_bucket)
        .await
        .with_context(|| {
            format!(
                "failed checking destination container {:?}",
                settings.dest_bucket
            )
        })?;
    if !destination_exists {
        return Err(anyhow!(
            "destination container {:?} does not exist",
            settings.dest_bucket
        ));
    }
    let objects = source
        .list_objects(&settings.source_container)
        .await
        .with_context(|| {
            format!(
                "failed listing source container {:?}",
                settings.source_container
            )
        })?;
    let source_count = objects.len() as u64;
    if objects.is_empty() {
        tracing::warn!(
            "no objects found in source container {:?}",
            settings.source_container
        );
    }
    tokio::fs::create_dir_all(&settings.staging_dir)
        .await
        .with_context(|| format!("failed creating staging directory {:?}", settings.staging_dir))?;
    let tasks = build_tasks(objects, &settings.staging_dir);
    let limiter =
        throttle::BandwidthLimiter::new(settings.bandwidth_limit_mbps.saturating_mul(1024 * 1024));
    let replenisher = limiter.clone();
    let replenish_handle = tokio::spawn(async move { replenisher.run_replenish_task().await });
    let ctx = Arc::new(Context {
        source,
        destination: destination.clone(),
        limiter,
        retry,
        progress,
        log: log.clone(),
        cancel: tokio_util::sync::CancellationToken::new(),
        settings: settings.clone(),
    });
    let (results, summary) = pool::run(ctx, tasks, settings.concurrency).await;
    replenish_handle.abort();
    if let Err(error) = tokio::fs::remove_dir_all(&settings.staging_dir).await {
        tracing::warn!(
            "failed removing staging directory {:?}: {error}",
            settings.staging_dir
        );
    } else {
        log.note("staged files removed").await;
    }
    // independent re-query of the destination for the cross-check
    let destination_count = match destination.count(&settings.dest_bucket).await {
        Ok(count) => Some(count),
        Err(error) => {
            tracing::warn!("failed counting destination objects: {error}");
            None
        }
    };
    let report = verify::reconcile(source_count, destination_count, &results);
    if report.matched {
        tracing::info!("object count matches between source and destination");
    } else {
        tracing::warn!(
            "reconciliation mismatch: {}",
            report.discrepancy.as_deref().unwrap_or("unknown")
        );
    }
    log.reconciliation(&report).await;
    log.flush().await;
    Ok(Outcome {
        results,
        summary,
        report,
    })
}
