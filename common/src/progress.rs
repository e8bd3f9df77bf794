use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicU64,
}

impl Counter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, value: u64) {
        self.count.fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct ProgressCounter {
    started: Counter,
    finished: Counter,
}

pub struct ProgressGuard<'a> {
    progress: &'a ProgressCounter,
}

impl<'a> ProgressGuard<'a> {
    pub fn new(progress: &'a ProgressCounter) -> Self {
        progress.started.inc();
        Self { progress }
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.progress.finished.inc();
    }
}

pub struct Status {
    pub started: u64,
    pub finished: u64,
}

impl ProgressCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self) -> ProgressGuard<'_> {
        ProgressGuard::new(self)
    }

    #[must_use]
    pub fn get(&self) -> Status {
        let mut started = self.started.get();
        let finished = self.finished.get();
        // relaxed counters may be read mid-update; never report an inversion
        if finished > started {
            started = finished;
        }
        Status { started, finished }
    }
}

/// Shared tallies for one migration run.
#[derive(Debug)]
pub struct Progress {
    pub ops: ProgressCounter,
    pub bytes_transferred: Counter,
    pub objects_succeeded: Counter,
    pub objects_skipped: Counter,
    pub objects_failed: Counter,
    start_time: std::time::Instant,
}

impl Progress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: ProgressCounter::new(),
            bytes_transferred: Counter::new(),
            objects_succeeded: Counter::new(),
            objects_skipped: Counter::new(),
            objects_failed: Counter::new(),
            start_time: std::time::Instant::now(),
        }
    }

    #[must_use]
    pub fn get_duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProgressPrinter {
    progress: Arc<Progress>,
    last_finished: u64,
    last_bytes: u64,
    last_update: std::time::Instant,
}

impl ProgressPrinter {
    #[must_use]
    pub fn new(progress: Arc<Progress>) -> Self {
        let last_finished = progress.ops.get().finished;
        let last_bytes = progress.bytes_transferred.get();
        Self {
            progress,
            last_finished,
            last_bytes,
            last_update: std::time::Instant::now(),
        }
    }

    pub fn print(&mut self) -> String {
        let time_now = std::time::Instant::now();
        let ops = self.progress.ops.get();
        let total_duration_secs = self.progress.get_duration().as_secs_f64().max(f64::EPSILON);
        let curr_duration_secs = (time_now - self.last_update).as_secs_f64().max(f64::EPSILON);
        let bytes = self.progress.bytes_transferred.get();
        let average_bytes_rate = bytes as f64 / total_duration_secs;
        let current_bytes_rate = (bytes - self.last_bytes) as f64 / curr_duration_secs;
        let current_ops_rate = (ops.finished - self.last_finished) as f64 / curr_duration_secs;
        self.last_finished = ops.finished;
        self.last_bytes = bytes;
        self.last_update = time_now;
        format!(
            "---------------------\n\
            OBJECTS:\n\
            pending:   {:>10}\n\
            current:   {:>10.2} objects/s\n\
            succeeded: {:>10}\n\
            skipped:   {:>10}\n\
            failed:    {:>10}\n\
            -----------------------\n\
            PUSHED:\n\
            average: {:>10}/s\n\
            current: {:>10}/s\n\
            total:   {:>10}",
            ops.started - ops.finished,
            current_ops_rate,
            self.progress.objects_succeeded.get(),
            self.progress.objects_skipped.get(),
            self.progress.objects_failed.get(),
            bytesize::ByteSize(average_bytes_rate as u64),
            bytesize::ByteSize(current_bytes_rate as u64),
            bytesize::ByteSize(bytes),
        )
    }
}
