//! Bounded worker pool draining the task queue.
//!
//! Exactly `concurrency` workers pull tasks from a shared channel and run
//! the transfer pipeline; results stream back over a channel so the tally
//! is serialized without shared counters. Every enqueued task produces
//! exactly one terminal result: when the cancellation token fires, workers
//! stop pulling and whatever never got dispatched is drained into `Failed`
//! results instead of being dropped.

use std::sync::Arc;

use tracing::instrument;

use crate::object::{TransferOutcome, TransferResult, TransferTask};
use crate::transfer::{self, Context, Summary};

#[instrument(skip_all, fields(tasks = tasks.len(), concurrency))]
pub async fn run(
    ctx: Arc<Context>,
    tasks: Vec<TransferTask>,
    concurrency: usize,
) -> (Vec<TransferResult>, Summary) {
    assert!(concurrency > 0, "worker pool requires at least one worker");
    let expected = tasks.len();
    let (task_tx, task_rx) = async_channel::unbounded();
    for task in tasks {
        // unbounded channel: send cannot block or fail while the receiver lives
        let _ = task_tx.send(task).await;
    }
    task_tx.close();
    let (result_tx, mut result_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut join_set = tokio::task::JoinSet::new();
    for _ in 0..concurrency {
        let ctx = ctx.clone();
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        join_set.spawn(async move {
            loop {
                let task = tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => break,
                    recv = task_rx.recv() => match recv {
                        Ok(task) => task,
                        Err(_) => break,
                    },
                };
                let result = transfer::execute(&ctx, task).await;
                if result_tx.send(result).is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);
    let mut results = Vec::with_capacity(expected);
    let mut summary = Summary::default();
    while let Some(result) = result_rx.recv().await {
        summary.record(&result);
        results.push(result);
    }
    while let Some(res) = join_set.join_next().await {
        if let Err(error) = res {
            tracing::error!("transfer worker aborted: {error}");
        }
    }
    // cancellation stops dispatch; undispatched tasks still owe a result
    while let Ok(task) = task_rx.try_recv() {
        let result = TransferResult {
            key: task.object.key.clone(),
            outcome: TransferOutcome::Failed,
            bytes_transferred: 0,
            attempts: task.attempts(),
            error: Some("cancelled before dispatch".to_string()),
        };
        ctx.progress.objects_failed.inc();
        ctx.log.failure(&result.key, "cancelled before dispatch").await;
        summary.record(&result);
        results.push(result);
    }
    (results, summary)
}
