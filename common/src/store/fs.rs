//! Filesystem-backed store: a local directory acts as a container.
//!
//! Keys map onto relative paths beneath the container directory. Directory
//! placeholders (keys with a trailing `/`) map onto directories; empty
//! directories are listed back as placeholder objects so hierarchy survives
//! a migration. Listings do not carry fingerprints - the transfer pipeline
//! fingerprints staged bytes itself - while `head` hashes the stored payload
//! on demand.

use async_recursion::async_recursion;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::checksum;
use crate::object::{self, Fingerprint, SourceObjectRef};
use crate::store::{DestinationStore, ObjectMeta, SourceStore, StoreError};

/// Store rooted directly in the paths passed as container names.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStore;

impl FsStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn object_path(container: &str, key: &str) -> std::path::PathBuf {
        std::path::Path::new(container).join(key.trim_end_matches('/'))
    }

    fn check_key(key: &str) -> Result<(), StoreError> {
        object::validate_key(key).map_err(|reason| StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    }

    async fn collect(container: &str) -> Result<Vec<SourceObjectRef>, StoreError> {
        let root = std::path::Path::new(container);
        match tokio::fs::metadata(root).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) | Err(_) => {
                return Err(StoreError::ContainerNotFound(container.to_string()));
            }
        }
        let mut objects = Vec::new();
        walk(root, "", &mut objects).await?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }
}

#[async_recursion]
async fn walk(
    dir: &std::path::Path,
    prefix: &str,
    objects: &mut Vec<SourceObjectRef>,
) -> Result<(), StoreError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut children = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        children += 1;
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry.metadata().await?;
        if metadata.is_dir() {
            walk(&entry.path(), &format!("{prefix}{name}/"), objects).await?;
        } else if metadata.is_file() {
            objects.push(SourceObjectRef {
                key: format!("{prefix}{name}"),
                size: metadata.len(),
                fingerprint: None,
            });
        } else {
            tracing::debug!(path = ?entry.path(), "skipping non-regular file");
        }
    }
    if children == 0 && !prefix.is_empty() {
        // keep empty directories alive as zero-byte placeholder objects
        objects.push(SourceObjectRef {
            key: prefix.to_string(),
            size: 0,
            fingerprint: None,
        });
    }
    Ok(())
}

#[async_trait]
impl SourceStore for FsStore {
    async fn list_objects(&self, container: &str) -> Result<Vec<SourceObjectRef>, StoreError> {
        Self::collect(container).await
    }

    async fn fetch(&self, container: &str, key: &str) -> Result<Bytes, StoreError> {
        Self::check_key(key)?;
        let path = Self::object_path(container, key);
        if key.ends_with('/') {
            return match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => Ok(Bytes::new()),
                Ok(_) | Err(_) => Err(StoreError::ObjectNotFound {
                    key: key.to_string(),
                }),
            };
        }
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::ObjectNotFound {
                    key: key.to_string(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl DestinationStore for FsStore {
    async fn exists(&self, bucket: &str) -> Result<bool, StoreError> {
        match tokio::fs::metadata(bucket).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        Self::check_key(key)?;
        let path = Self::object_path(bucket, key);
        if key.ends_with('/') {
            return match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => {
                    Ok(Some(checksum::fingerprint_bytes(b"")))
                }
                Ok(_) => Ok(None),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(error) => Err(error.into()),
            };
        }
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(checksum::fingerprint_bytes(&data))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        meta: &ObjectMeta,
    ) -> Result<(), StoreError> {
        Self::check_key(key)?;
        let path = Self::object_path(bucket, key);
        if key.ends_with('/') {
            tokio::fs::create_dir_all(&path).await?;
            return Ok(());
        }
        // verify payload integrity up front when the caller supplied a fingerprint
        if let Some(expected) = &meta.fingerprint {
            let actual = checksum::fingerprint_bytes(&bytes);
            if &actual != expected {
                return Err(StoreError::Transient {
                    message: format!(
                        "payload fingerprint {actual} does not match expected {expected} for `{key}`"
                    ),
                });
            }
        }
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey {
                key: key.to_string(),
                reason: "object path has no parent directory".to_string(),
            })?
            .to_path_buf();
        tokio::fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{:016x}", rand::random::<u64>()));
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        let write_result = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;
        if let Err(error) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(error.into());
        }
        Ok(())
    }

    async fn count(&self, bucket: &str) -> Result<u64, StoreError> {
        Ok(Self::collect(bucket).await?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;

    #[tokio::test]
    async fn put_head_fetch_round_trip() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let bucket = tmp_dir.join("bucket");
        tokio::fs::create_dir(&bucket).await.unwrap();
        let bucket = bucket.to_string_lossy().into_owned();
        let store = FsStore::new();
        let payload = Bytes::from_static(b"payload");
        let meta = ObjectMeta {
            size: payload.len() as u64,
            fingerprint: Some(checksum::fingerprint_bytes(b"payload")),
        };
        store.put(&bucket, "a/b/object.txt", payload.clone(), &meta).await.unwrap();
        let head = store.head(&bucket, "a/b/object.txt").await.unwrap();
        assert_eq!(head, Some(checksum::fingerprint_bytes(b"payload")));
        let fetched = store.fetch(&bucket, "a/b/object.txt").await.unwrap();
        assert_eq!(fetched, payload);
    }

    #[tokio::test]
    async fn head_of_absent_object_is_none() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let bucket = tmp_dir.to_string_lossy().into_owned();
        let store = FsStore::new();
        assert_eq!(store.head(&bucket, "missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn listing_includes_empty_directory_placeholders() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let container = tmp_dir.join("src");
        tokio::fs::create_dir(&container).await.unwrap();
        tokio::fs::write(container.join("top.txt"), "0").await.unwrap();
        tokio::fs::create_dir_all(container.join("nested/deep")).await.unwrap();
        tokio::fs::write(container.join("nested/deep/leaf.txt"), "1").await.unwrap();
        tokio::fs::create_dir(container.join("empty")).await.unwrap();
        let container = container.to_string_lossy().into_owned();
        let store = FsStore::new();
        let keys: Vec<String> = store
            .list_objects(&container)
            .await
            .unwrap()
            .into_iter()
            .map(|object| object.key)
            .collect();
        assert_eq!(keys, vec!["empty/", "nested/deep/leaf.txt", "top.txt"]);
        assert_eq!(store.count(&container).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn marker_put_creates_directory() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let bucket = tmp_dir.to_string_lossy().into_owned();
        let store = FsStore::new();
        store
            .put(&bucket, "placeholder/", Bytes::new(), &ObjectMeta::default())
            .await
            .unwrap();
        assert_eq!(
            store.head(&bucket, "placeholder/").await.unwrap(),
            Some(checksum::fingerprint_bytes(b"")),
        );
    }

    #[tokio::test]
    async fn escaping_keys_are_rejected() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let bucket = tmp_dir.to_string_lossy().into_owned();
        let store = FsStore::new();
        let result = store.fetch(&bucket, "../escape.txt").await;
        assert!(matches!(result, Err(StoreError::InvalidKey { .. })));
    }

    #[tokio::test]
    async fn missing_container_is_reported() {
        let store = FsStore::new();
        let result = SourceStore::list_objects(&store, "/definitely/not/here").await;
        assert!(matches!(result, Err(StoreError::ContainerNotFound(_))));
    }

    #[tokio::test]
    async fn mismatched_fingerprint_is_rejected_before_write() {
        let tmp_dir = testutils::create_temp_dir().await.unwrap();
        let bucket = tmp_dir.to_string_lossy().into_owned();
        let store = FsStore::new();
        let meta = ObjectMeta {
            size: 3,
            fingerprint: Some(checksum::fingerprint_bytes(b"other")),
        };
        let result = store
            .put(&bucket, "object.txt", Bytes::from_static(b"abc"), &meta)
            .await;
        assert!(matches!(result, Err(StoreError::Transient { .. })));
        assert_eq!(store.head(&bucket, "object.txt").await.unwrap(), None);
    }
}
