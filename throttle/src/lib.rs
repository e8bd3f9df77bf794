//! Bandwidth throttling for object transfers
//!
//! This crate provides a token-bucket bandwidth limiter shared by every
//! concurrent transfer worker. One token corresponds to one byte; tokens are
//! replenished at fixed intervals by a background task, so average outbound
//! throughput is bounded by the configured byte rate while short bursts are
//! capped at one replenish interval's worth of bytes.
//!
//! # Usage
//!
//! ```rust,no_run
//! use throttle::BandwidthLimiter;
//!
//! # async fn example() {
//! // 8 MB/s aggregate ceiling
//! let limiter = BandwidthLimiter::new(8 * 1024 * 1024);
//!
//! // Replenishment runs in the background for the lifetime of the transfer
//! let replenisher = limiter.clone();
//! tokio::spawn(async move { replenisher.run_replenish_task().await });
//!
//! // Every worker acquires before sending
//! limiter.acquire(64 * 1024).await;
//! // send 64 KiB here
//! # }
//! ```
//!
//! # Oversized requests
//!
//! `acquire` consumes tokens in chunks of at most the bucket capacity, so a
//! request larger than the bucket still completes - it simply spreads across
//! several replenish intervals. The capacity is a ceiling on instantaneous
//! burst, not a cap on single-request size.
//!
//! # Thread safety
//!
//! The limiter is cheaply cloneable and safe for concurrent use from any
//! number of tasks; the underlying semaphore is the only synchronized state.

mod bucket;

use std::sync::Arc;

/// Interval at which the background task restores bucket tokens.
pub const REPLENISH_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

/// Shared token-bucket limiter capping aggregate outbound bytes per second.
#[derive(Clone)]
pub struct BandwidthLimiter {
    bucket: Arc<bucket::TokenBucket>,
}

impl BandwidthLimiter {
    /// Create a limiter enforcing `bytes_per_sec` aggregate throughput.
    ///
    /// A rate of zero disables limiting entirely; `acquire` then returns
    /// immediately.
    #[must_use]
    pub fn new(bytes_per_sec: u64) -> Self {
        Self {
            bucket: Arc::new(bucket::TokenBucket::new(bytes_per_sec, REPLENISH_INTERVAL)),
        }
    }

    /// Create a limiter that never throttles.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.bucket.is_enabled()
    }

    /// Block until `bytes` may be sent without exceeding the configured rate.
    pub async fn acquire(&self, bytes: u64) {
        self.bucket.consume(bytes).await;
    }

    /// Restore tokens forever at [`REPLENISH_INTERVAL`]. Spawn this on a
    /// clone of the limiter; it returns immediately when limiting is
    /// disabled.
    pub async fn run_replenish_task(&self) {
        self.bucket.run_replenish_task().await;
    }
}
