//! Filesystem-based object storage implementation

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::location::ObjectLocation;
use super::storage::ObjectStore;

/// Local filesystem object storage (local runs and fixtures)
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemObjectStore;

impl FilesystemObjectStore {
    fn path(location: &ObjectLocation) -> Result<&Path, StorageError> {
        match location {
            ObjectLocation::File(path) => Ok(path),
            other => Err(StorageError::InvalidLocation(format!(
                "not a filesystem location: {other}"
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError> {
        let path = Self::path(location)?;

        // Read directly; map ENOENT to NotFound instead of a separate exists() check
        fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    location: location.to_string(),
                }
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn put(&self, location: &ObjectLocation, data: &[u8]) -> Result<(), StorageError> {
        let path = Self::path(location)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;

        tracing::debug!(path = %path.display(), size = data.len(), "Object written");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let location = ObjectLocation::File(dir.path().join("nested/dir/out.jsonl"));
        let store = FilesystemObjectStore;

        store.put(&location, b"{\"a\":1}\n").await.unwrap();
        assert_eq!(store.get(&location).await.unwrap(), b"{\"a\":1}\n");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let location = ObjectLocation::File(dir.path().join("missing.jsonl"));
        let result = FilesystemObjectStore.get(&location).await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_rejects_s3_location() {
        let location = ObjectLocation::parse("s3://bucket/key").unwrap();
        let result = FilesystemObjectStore.get(&location).await;
        assert!(matches!(result, Err(StorageError::InvalidLocation(_))));
    }
}
