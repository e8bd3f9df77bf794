//! Human-readable transfer log: one line per significant event.
//!
//! The file is named deterministically from the run's start timestamp and
//! the source/destination identifiers, e.g.
//! `2026-08-06_14-02-11_photos_to_archive.log`. It is log output only -
//! there is no resumability contract and nothing parses it back.

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::verify::Report;

#[derive(Debug, Clone)]
pub struct EventLog {
    log_opt: Option<
        std::sync::Arc<tokio::sync::Mutex<tokio::io::BufWriter<tokio::fs::File>>>,
    >,
}

/// Replace path-hostile characters so container names can appear in a file
/// name.
fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn timestamp() -> String {
    chrono::Local::now().format("%a %Y-%m-%d %H:%M:%S").to_string()
}

impl EventLog {
    #[must_use]
    pub fn disabled() -> Self {
        Self { log_opt: None }
    }

    /// Create the per-run log file under `dir` and write its header.
    pub async fn create(
        dir: &std::path::Path,
        source: &str,
        destination: &str,
        region: &str,
    ) -> Result<(Self, std::path::PathBuf)> {
        let file_name = format!(
            "{}_{}_to_{}.log",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"),
            sanitize_identifier(source),
            sanitize_identifier(destination),
        );
        let log_path = dir.join(file_name);
        let log_file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&log_path)
            .await
            .with_context(|| format!("Failed to open log file: {log_path:?}"))?;
        let log = std::sync::Arc::new(tokio::sync::Mutex::new(tokio::io::BufWriter::new(
            log_file,
        )));
        let event_log = Self { log_opt: Some(log) };
        event_log
            .write(&format!(
                "starting transfer of `{source}` to `{destination}` (region {region})"
            ))
            .await;
        Ok((event_log, log_path))
    }

    async fn write(&self, message: &str) {
        if let Some(log) = &self.log_opt {
            let mut log = log.lock().await;
            let line = format!("{} - {}\n", timestamp(), message);
            if let Err(error) = log.write_all(line.as_bytes()).await {
                tracing::warn!("failed writing to the transfer log: {error}");
            }
        }
    }

    pub async fn task_started(&self, key: &str) {
        self.write(&format!("[START] {key}")).await;
    }

    pub async fn skip(&self, key: &str) {
        self.write(&format!("[SKIP] {key} is up to date")).await;
    }

    pub async fn retry(
        &self,
        key: &str,
        step: &str,
        attempt: u32,
        delay: std::time::Duration,
        error: &crate::store::StoreError,
    ) {
        self.write(&format!(
            "[RETRY] {key}: {step} attempt {attempt} failed ({error}), retrying in {delay:?}"
        ))
        .await;
    }

    pub async fn success(&self, key: &str, bytes: u64, attempts: u32) {
        self.write(&format!(
            "[OK] {key} transferred ({bytes} bytes, attempt {attempts})"
        ))
        .await;
    }

    pub async fn failure(&self, key: &str, error: &str) {
        self.write(&format!("[FAILED] {key}: {error}")).await;
    }

    pub async fn note(&self, message: &str) {
        self.write(message).await;
    }

    pub async fn reconciliation(&self, report: &Report) {
        let verdict = if report.matched { "matched" } else { "MISMATCH" };
        self.write(&format!(
            "[RECONCILE] {}: source {} objects, destination {}, succeeded {}, skipped {}, failed {}",
            verdict,
            report.source_count,
            report
                .destination_count
                .map_or_else(|| "unavailable".to_string(), |count| count.to_string()),
            report.succeeded,
            report.skipped,
            report.failed,
        ))
        .await;
        if let Some(discrepancy) = &report.discrepancy {
            self.write(&format!("[RECONCILE] discrepancy: {discrepancy}"))
                .await;
        }
    }

    pub async fn flush(&self) {
        if let Some(log) = &self.log_opt {
            let mut log = log.lock().await;
            if let Err(error) = log.flush().await {
                tracing::warn!("failed flushing the transfer log: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(sanitize_identifier("photos-2024"), "photos-2024");
        assert_eq!(sanitize_identifier("/data/src dir"), "-data-src-dir");
    }

    #[tokio::test]
    async fn events_land_in_the_named_file() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let (log, path) = EventLog::create(&tmp_dir, "src", "dst", "local").await.unwrap();
        log.task_started("a.txt").await;
        log.skip("a.txt").await;
        log.flush().await;
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_src_to_dst.log"), "{name}");
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("[START] a.txt"));
        assert!(contents.contains("[SKIP] a.txt"));
    }

    #[tokio::test]
    async fn disabled_log_is_a_no_op() {
        let log = EventLog::disabled();
        log.task_started("a.txt").await;
        log.flush().await;
    }
}
