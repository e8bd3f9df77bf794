//! Configuration types for runtime and migration settings

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of runtime worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// Settings for one migration run, consumed as plain values. The CLI layer
/// owns parsing; the engine owns validation.
#[derive(Debug, Clone)]
pub struct MigrateSettings {
    /// Name (or path, for the filesystem store) of the source container
    pub source_container: String,
    /// Name (or path) of the destination container
    pub dest_bucket: String,
    /// Region identifier recorded with the run
    pub region: String,
    /// Number of concurrent transfer workers (>= 1)
    pub concurrency: usize,
    /// Aggregate bandwidth ceiling in MB/s (0 = unlimited)
    pub bandwidth_limit_mbps: u64,
    /// Maximum attempts per retryable object operation (>= 1)
    pub max_attempts: u32,
    /// Directory objects are staged into while in flight
    pub staging_dir: std::path::PathBuf,
}

impl MigrateSettings {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.source_container.is_empty() {
            return Err("source container must not be empty".to_string());
        }
        if self.dest_bucket.is_empty() {
            return Err("destination container must not be empty".to_string());
        }
        if self.source_container == self.dest_bucket {
            return Err("source and destination containers must differ".to_string());
        }
        if self.region.is_empty() {
            return Err("region must not be empty".to_string());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max attempts must be at least 1".to_string());
        }
        Ok(())
    }
}
