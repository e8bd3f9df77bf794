//! Change-detection gate deciding whether an object needs re-transfer.

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::object::Fingerprint;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Transfer,
}

/// Skip iff both fingerprints are present and equal. Everything else -
/// destination absent, either fingerprint unavailable - transfers; an
/// object is never silently dropped.
#[must_use]
pub fn decide(source: Option<&Fingerprint>, destination: Option<&Fingerprint>) -> Decision {
    match (source, destination) {
        (Some(source), Some(destination)) if source == destination => Decision::Skip,
        _ => Decision::Transfer,
    }
}

#[must_use]
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::from_digest(md5::compute(data))
}

const READ_CHUNK: usize = 64 * 1024;

/// Streaming fingerprint of a staged file.
pub async fn fingerprint_file(path: &std::path::Path) -> Result<Fingerprint> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed opening {path:?} for fingerprinting"))?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .with_context(|| format!("failed reading {path:?} while fingerprinting"))?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(Fingerprint::from_digest(context.compute()))
}
