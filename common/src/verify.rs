//! Post-transfer reconciliation of source and destination object counts.

use serde::Serialize;

use crate::object::{TransferOutcome, TransferResult};

/// Outcome of reconciliation. Never an error: discrepancies are reported,
/// remediation is the caller's concern.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub matched: bool,
    pub source_count: u64,
    /// Independently re-queried after the pool drained; `None` when the
    /// count query itself failed.
    pub destination_count: Option<u64>,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub discrepancy: Option<String>,
}

/// Cross-check the collected results against the source listing and the
/// re-queried destination count.
#[must_use]
pub fn reconcile(
    source_count: u64,
    destination_count: Option<u64>,
    results: &[TransferResult],
) -> Report {
    let mut succeeded = 0u64;
    let mut skipped = 0u64;
    let mut failed = 0u64;
    for result in results {
        match result.outcome {
            TransferOutcome::Succeeded => succeeded += 1,
            TransferOutcome::Skipped => skipped += 1,
            TransferOutcome::Failed => failed += 1,
        }
    }
    let mut problems = Vec::new();
    if failed > 0 {
        problems.push(format!("{failed} object(s) ended in failure"));
    }
    if succeeded + skipped + failed != source_count {
        problems.push(format!(
            "results cover {} object(s) but the source listed {}",
            succeeded + skipped + failed,
            source_count,
        ));
    }
    match destination_count {
        Some(count) if count != source_count => {
            problems.push(format!(
                "destination holds {count} object(s), expected {source_count}"
            ));
        }
        Some(_) => {}
        None => problems.push("destination object count unavailable".to_string()),
    }
    let discrepancy = if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    };
    Report {
        matched: discrepancy.is_none(),
        source_count,
        destination_count,
        succeeded,
        skipped,
        failed,
        discrepancy,
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "reconciliation: {}\n\
            source objects:      {:>10}\n\
            destination objects: {:>10}\n\
            succeeded:           {:>10}\n\
            skipped:             {:>10}\n\
            failed:              {:>10}",
            if self.matched { "matched" } else { "MISMATCH" },
            self.source_count,
            self.destination_count
                .map_or_else(|| "unavailable".to_string(), |count| count.to_string()),
            self.succeeded,
            self.skipped,
            self.failed,
        )?;
        if let Some(discrepancy) = &self.discrepancy {
            write!(f, "\ndiscrepancy: {discrepancy}")?;
        }
        Ok(())
    }
}
