//! In-memory object storage

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::StorageError;
use super::location::ObjectLocation;
use super::storage::ObjectStore;

/// Object store backed by a map, keyed by location
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectLocation, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub fn insert(&self, location: ObjectLocation, data: impl Into<Vec<u8>>) {
        self.objects.write().insert(location, data.into());
    }

    /// Snapshot of a stored object
    pub fn object(&self, location: &ObjectLocation) -> Option<Vec<u8>> {
        self.objects.read().get(location).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError> {
        self.object(location).ok_or_else(|| StorageError::NotFound {
            location: location.to_string(),
        })
    }

    async fn put(&self, location: &ObjectLocation, data: &[u8]) -> Result<(), StorageError> {
        self.insert(location.clone(), data);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
