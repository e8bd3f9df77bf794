//! In-memory store used by the engine tests.
//!
//! Containers are name-keyed maps of key -> payload. Listings carry
//! fingerprints (like a real object-store listing would). Failures can be
//! scripted per key and are consumed one at a time, which is enough to
//! exercise the retry, cancellation and reconciliation paths without any
//! real store behind them.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::checksum;
use crate::object::{Fingerprint, SourceObjectRef};
use crate::store::{DestinationStore, ObjectMeta, SourceStore, StoreError};

#[derive(Default)]
struct Inner {
    containers: HashMap<String, BTreeMap<String, Bytes>>,
    fetch_failures: HashMap<String, VecDeque<StoreError>>,
    put_failures: HashMap<String, VecDeque<StoreError>>,
    put_count: u64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_container(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.containers.entry(name.to_string()).or_default();
    }

    pub fn insert_object(&self, container: &str, key: &str, bytes: impl Into<Bytes>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .containers
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), bytes.into());
    }

    #[must_use]
    pub fn object(&self, container: &str, key: &str) -> Option<Bytes> {
        let inner = self.inner.lock().unwrap();
        inner.containers.get(container)?.get(key).cloned()
    }

    /// Number of puts observed across all containers, including failed ones.
    #[must_use]
    pub fn put_count(&self) -> u64 {
        self.inner.lock().unwrap().put_count
    }

    /// Queue an error for the next fetch of `key`; errors are consumed in
    /// order, after which fetches succeed again.
    pub fn push_fetch_failure(&self, key: &str, error: StoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .fetch_failures
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Queue an error for the next put of `key`.
    pub fn push_put_failure(&self, key: &str, error: StoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .put_failures
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_objects(&self, container: &str) -> Result<Vec<SourceObjectRef>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let objects = inner
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(objects
            .iter()
            .map(|(key, bytes)| SourceObjectRef {
                key: key.clone(),
                size: bytes.len() as u64,
                fingerprint: Some(checksum::fingerprint_bytes(bytes)),
            })
            .collect())
    }

    async fn fetch(&self, container: &str, key: &str) -> Result<Bytes, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(queue) = inner.fetch_failures.get_mut(key) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }
        let objects = inner
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.containers.contains_key(bucket))
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let objects = inner
            .containers
            .get(bucket)
            .ok_or_else(|| StoreError::ContainerNotFound(bucket.to_string()))?;
        Ok(objects.get(key).map(|bytes| checksum::fingerprint_bytes(bytes)))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        _meta: &ObjectMeta,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.put_count += 1;
        if let Some(queue) = inner.put_failures.get_mut(key) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }
        let objects = inner
            .containers
            .get_mut(bucket)
            .ok_or_else(|| StoreError::ContainerNotFound(bucket.to_string()))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn count(&self, bucket: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        let objects = inner
            .containers
            .get(bucket)
            .ok_or_else(|| StoreError::ContainerNotFound(bucket.to_string()))?;
        Ok(objects.len() as u64)
    }
}
