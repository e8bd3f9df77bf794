//! Per-object transfer pipeline: stage, check, push, cleanup.
//!
//! A worker owns its task for the task's whole lifetime. Stage and push are
//! each retried in place through the stateless [`RetryPolicy`]; the checksum
//! gate between them short-circuits unchanged objects to `Skipped` without
//! ever reaching the push step. The staging file is released on every exit
//! path.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::checksum::{self, Decision};
use crate::config::MigrateSettings;
use crate::eventlog::EventLog;
use crate::object::{Fingerprint, TaskState, TransferOutcome, TransferResult, TransferTask};
use crate::progress::Progress;
use crate::retry::{Backoff, RetryPolicy};
use crate::store::{DestinationStore, ObjectMeta, SourceStore, StoreError};

/// Everything a worker needs, passed explicitly at construction. The
/// cancellation token and the limiter's internal bucket are the only state
/// shared between workers.
pub struct Context {
    pub source: Arc<dyn SourceStore>,
    pub destination: Arc<dyn DestinationStore>,
    pub limiter: throttle::BandwidthLimiter,
    pub retry: RetryPolicy,
    pub progress: Arc<Progress>,
    pub log: EventLog,
    pub cancel: tokio_util::sync::CancellationToken,
    pub settings: MigrateSettings,
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Summary {
    pub objects_succeeded: usize,
    pub objects_skipped: usize,
    pub objects_failed: usize,
    pub bytes_transferred: u64,
}

impl Summary {
    pub fn record(&mut self, result: &TransferResult) {
        match result.outcome {
            TransferOutcome::Succeeded => {
                self.objects_succeeded += 1;
                self.bytes_transferred += result.bytes_transferred;
            }
            TransferOutcome::Skipped => self.objects_skipped += 1,
            TransferOutcome::Failed => self.objects_failed += 1,
        }
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            objects_succeeded: self.objects_succeeded + other.objects_succeeded,
            objects_skipped: self.objects_skipped + other.objects_skipped,
            objects_failed: self.objects_failed + other.objects_failed,
            bytes_transferred: self.bytes_transferred + other.bytes_transferred,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes transferred: {}\n\
            objects transferred: {}\n\
            objects unchanged: {}\n\
            objects failed: {}",
            bytesize::ByteSize(self.bytes_transferred),
            self.objects_succeeded,
            self.objects_skipped,
            self.objects_failed,
        )
    }
}

/// Staged bytes for one object. Directory markers stage nothing; everything
/// else lands in a file under the task's staging path. Removal is explicit
/// on the pipeline's exit paths, with drop as the backstop.
struct StagedFile {
    path: Option<std::path::PathBuf>,
}

impl StagedFile {
    fn empty() -> Self {
        Self { path: None }
    }

    async fn materialize(path: &std::path::Path, bytes: &Bytes) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        Ok(Self {
            path: Some(path.to_path_buf()),
        })
    }

    async fn fingerprint(&self) -> anyhow::Result<Fingerprint> {
        match &self.path {
            Some(path) => checksum::fingerprint_file(path).await,
            None => Ok(checksum::fingerprint_bytes(b"")),
        }
    }

    async fn read(&self) -> Result<Bytes, StoreError> {
        match &self.path {
            Some(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            None => Ok(Bytes::new()),
        }
    }

    async fn remove(mut self) {
        if let Some(path) = self.path.take() {
            if let Err(error) = tokio::fs::remove_file(&path).await {
                if error.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("failed removing staged file {path:?}: {error}");
                }
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

enum PipelineEnd {
    Skipped,
    Pushed(u64),
}

/// Run one task to its terminal state and produce its result. Per-object
/// errors never escape; only the result records them.
#[instrument(skip_all, fields(key = %task.object.key))]
pub async fn execute(ctx: &Context, mut task: TransferTask) -> TransferResult {
    let _ops_guard = ctx.progress.ops.guard();
    ctx.log.task_started(&task.object.key).await;
    match run_pipeline(ctx, &mut task).await {
        Ok(PipelineEnd::Skipped) => {
            ctx.progress.objects_skipped.inc();
            ctx.log.skip(&task.object.key).await;
            TransferResult {
                key: task.object.key.clone(),
                outcome: TransferOutcome::Skipped,
                bytes_transferred: 0,
                attempts: task.attempts(),
                error: None,
            }
        }
        Ok(PipelineEnd::Pushed(bytes)) => {
            ctx.progress.objects_succeeded.inc();
            ctx.progress.bytes_transferred.add(bytes);
            ctx.log.success(&task.object.key, bytes, task.attempts()).await;
            TransferResult {
                key: task.object.key.clone(),
                outcome: TransferOutcome::Succeeded,
                bytes_transferred: bytes,
                attempts: task.attempts(),
                error: None,
            }
        }
        Err(error) => {
            if !task.state().is_terminal() {
                task.set_state(TaskState::Failed);
            }
            let message = error.to_string();
            ctx.progress.objects_failed.inc();
            tracing::error!(key = %task.object.key, "transfer failed: {error}");
            ctx.log.failure(&task.object.key, &message).await;
            TransferResult {
                key: task.object.key.clone(),
                outcome: TransferOutcome::Failed,
                bytes_transferred: 0,
                attempts: task.attempts(),
                error: Some(message),
            }
        }
    }
}

async fn run_pipeline(ctx: &Context, task: &mut TransferTask) -> Result<PipelineEnd, StoreError> {
    if let Err(reason) = crate::object::validate_key(&task.object.key) {
        return Err(StoreError::InvalidKey {
            key: task.object.key.clone(),
            reason,
        });
    }
    ensure_live(ctx)?;
    task.set_state(TaskState::Staging);
    let staged = stage(ctx, task).await?;

    ensure_live(ctx)?;
    task.set_state(TaskState::Checking);
    let source_fingerprint = match staged.fingerprint().await {
        Ok(fingerprint) => Some(fingerprint),
        Err(error) => {
            // fail open: an unverifiable object is transferred, never dropped
            tracing::warn!(
                key = %task.object.key,
                "fingerprinting staged bytes failed, falling back to the listing: {error:#}"
            );
            task.object.fingerprint.clone()
        }
    };
    let destination_fingerprint = match ctx
        .destination
        .head(&ctx.settings.dest_bucket, &task.dest_key)
        .await
    {
        Ok(fingerprint) => fingerprint,
        Err(error) if error.is_global() => {
            ctx.cancel.cancel();
            return Err(error);
        }
        Err(error) => {
            tracing::warn!(
                key = %task.object.key,
                "destination head failed, transferring anyway: {error}"
            );
            None
        }
    };
    if checksum::decide(source_fingerprint.as_ref(), destination_fingerprint.as_ref())
        == Decision::Skip
    {
        task.set_state(TaskState::Skipped);
        staged.remove().await;
        return Ok(PipelineEnd::Skipped);
    }

    ensure_live(ctx)?;
    task.set_state(TaskState::Pushing);
    let bytes = staged.read().await?;
    let size = bytes.len() as u64;
    let meta = ObjectMeta {
        size,
        fingerprint: source_fingerprint,
    };
    push(ctx, task, bytes, meta).await?;
    task.set_state(TaskState::Done);
    staged.remove().await;
    Ok(PipelineEnd::Pushed(size))
}

async fn stage(ctx: &Context, task: &mut TransferTask) -> Result<StagedFile, StoreError> {
    if task.object.is_directory_marker() {
        return Ok(StagedFile::empty());
    }
    let source = ctx.source.clone();
    let container = ctx.settings.source_container.clone();
    let key = task.object.key.clone();
    let bytes = with_retries(ctx, task, "stage", move || {
        let source = source.clone();
        let container = container.clone();
        let key = key.clone();
        async move { source.fetch(&container, &key).await }
    })
    .await?;
    StagedFile::materialize(&task.staging_path, &bytes).await
}

async fn push(
    ctx: &Context,
    task: &mut TransferTask,
    bytes: Bytes,
    meta: ObjectMeta,
) -> Result<(), StoreError> {
    let destination = ctx.destination.clone();
    let limiter = ctx.limiter.clone();
    let bucket = ctx.settings.dest_bucket.clone();
    let key = task.dest_key.clone();
    with_retries(ctx, task, "push", move || {
        let destination = destination.clone();
        let limiter = limiter.clone();
        let bucket = bucket.clone();
        let key = key.clone();
        let bytes = bytes.clone();
        let meta = meta.clone();
        async move {
            // every attempt pays for its bandwidth, including re-sends
            limiter.acquire(meta.size).await;
            destination.put(&bucket, &key, bytes, &meta).await
        }
    })
    .await
}

/// Drive one retryable operation to success or exhaustion. The policy is
/// stateless; the attempt number lives here and is recorded on the task.
async fn with_retries<T, Fut, Op>(
    ctx: &Context,
    task: &mut TransferTask,
    step: &str,
    mut op: Op,
) -> Result<T, StoreError>
where
    Op: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1u32;
    loop {
        let result = op().await;
        task.record_attempt(attempt);
        match result {
            Ok(value) => return Ok(value),
            Err(error) => {
                if error.is_global() {
                    tracing::error!(
                        key = %task.object.key,
                        "fatal error, cancelling the run: {error}"
                    );
                    ctx.cancel.cancel();
                    return Err(error);
                }
                match ctx.retry.decide(attempt, &error) {
                    Backoff::Retry(delay) => {
                        tracing::warn!(
                            key = %task.object.key,
                            attempt,
                            "{step} failed ({error}), retrying in {delay:?}"
                        );
                        ctx.log
                            .retry(&task.object.key, step, attempt, delay, &error)
                            .await;
                        if task.state() == TaskState::Pushing {
                            task.set_state(TaskState::Retrying);
                        }
                        tokio::time::sleep(delay).await;
                        if ctx.cancel.is_cancelled() {
                            return Err(StoreError::Cancelled);
                        }
                        if task.state() == TaskState::Retrying {
                            task.set_state(TaskState::Pushing);
                        }
                        attempt += 1;
                    }
                    Backoff::GiveUp => return Err(error),
                }
            }
        }
    }
}

fn ensure_live(ctx: &Context) -> Result<(), StoreError> {
    if ctx.cancel.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}
