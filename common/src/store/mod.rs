//! Opaque object-store capabilities the engine is written against.
//!
//! The engine never speaks a store protocol itself; it consumes a source
//! that can list and fetch, and a destination that can head, put and count.
//! [`fs::FsStore`] backs the shipped binary (a local directory acts as a
//! container); [`memory::MemoryStore`] backs the tests.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::object::{Fingerprint, SourceObjectRef};

/// Error taxonomy for store operations.
///
/// Retryable variants are transient by nature and worth re-attempting after
/// a backoff. Global variants doom the whole run, not just one object, and
/// escalate to pool-wide cancellation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transient store failure: {message}")]
    Transient { message: String },
    #[error("request throttled by the remote store")]
    Throttled,
    #[error("credentials expired")]
    AuthExpired,
    #[error("container `{0}` not found")]
    ContainerNotFound(String),
    #[error("object `{key}` not found")]
    ObjectNotFound { key: String },
    #[error("invalid object key `{key}`: {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Errors worth re-attempting after a backoff. `ObjectNotFound` from a
    /// fetch means the listing raced a deletion; the object may reappear.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Transient { .. }
                | StoreError::Throttled
                | StoreError::ObjectNotFound { .. }
                | StoreError::Io(_)
        )
    }

    /// Errors that invalidate the whole run and cancel the pool.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            StoreError::AuthExpired | StoreError::ContainerNotFound(_)
        )
    }
}

/// Metadata recorded alongside a put. Stores may use the fingerprint to
/// verify payload integrity on arrival.
#[derive(Clone, Debug, Default)]
pub struct ObjectMeta {
    pub size: u64,
    pub fingerprint: Option<Fingerprint>,
}

/// The source side: a finite listing plus per-object fetch. The listing is
/// not restartable mid-stream.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_objects(&self, container: &str) -> Result<Vec<SourceObjectRef>, StoreError>;

    async fn fetch(&self, container: &str, key: &str) -> Result<Bytes, StoreError>;
}

/// The destination side: existence preflight, per-key head, put, and an
/// independent object count for reconciliation.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Content fingerprint of the stored object, or `None` when absent.
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<Fingerprint>, StoreError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        meta: &ObjectMeta,
    ) -> Result<(), StoreError>;

    async fn count(&self, bucket: &str) -> Result<u64, StoreError>;
}
