use std::sync::atomic::{AtomicBool, Ordering};

// Largest chunk acquirable in one semaphore call; also bounds burst capacity.
const MAX_CHUNK: u64 = u32::MAX as u64;

pub(crate) struct TokenBucket {
    enabled: AtomicBool,
    // tokens restored per interval; also the bucket capacity (burst ceiling)
    capacity: u64,
    interval: std::time::Duration,
    sem: tokio::sync::Semaphore,
}

impl TokenBucket {
    pub(crate) fn new(bytes_per_sec: u64, interval: std::time::Duration) -> Self {
        if bytes_per_sec == 0 {
            return Self {
                enabled: AtomicBool::new(false),
                capacity: 0,
                interval,
                sem: tokio::sync::Semaphore::const_new(0),
            };
        }
        let per_interval = bytes_per_sec.saturating_mul(interval.as_millis() as u64) / 1000;
        let capacity = per_interval.clamp(1, MAX_CHUNK);
        if per_interval > MAX_CHUNK {
            tracing::warn!(
                "bandwidth rate {} B/s exceeds the maximum burst granularity, capping bursts at {} bytes",
                bytes_per_sec,
                MAX_CHUNK,
            );
        }
        Self {
            enabled: AtomicBool::new(true),
            capacity,
            interval,
            sem: tokio::sync::Semaphore::const_new(capacity as usize),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) async fn consume(&self, mut tokens: u64) {
        if !self.is_enabled() {
            return;
        }
        while tokens > 0 {
            let chunk = tokens.min(self.capacity);
            // chunk <= capacity <= u32::MAX by construction
            self.sem
                .acquire_many(chunk as u32)
                .await
                .expect("bandwidth semaphore is never closed")
                .forget();
            tokens -= chunk;
        }
    }

    pub(crate) async fn run_replenish_task(&self) {
        if !self.is_enabled() {
            return;
        }
        loop {
            tokio::time::sleep(self.interval).await;
            let curr_permits = self.sem.available_permits();
            let capacity = self.capacity as usize;
            if curr_permits >= capacity {
                continue;
            }
            self.sem.add_permits(capacity - curr_permits);
        }
    }
}
