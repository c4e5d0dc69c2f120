//! Object storage for stage sources and destinations
//!
//! Locations are routed by scheme: `s3://` to S3, everything else to the
//! local filesystem.

mod error;
mod filesystem;
mod location;
mod memory;
mod s3;
mod storage;

use std::sync::Arc;

use async_trait::async_trait;

pub use error::StorageError;
pub use filesystem::FilesystemObjectStore;
pub use location::ObjectLocation;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use storage::ObjectStore;

use crate::core::AwsConfig;

/// Dispatches each call to the backend that owns the location scheme
pub struct RoutingObjectStore {
    s3: Option<Arc<dyn ObjectStore>>,
    files: Arc<dyn ObjectStore>,
}

impl RoutingObjectStore {
    pub fn new(s3: Option<Arc<dyn ObjectStore>>, files: Arc<dyn ObjectStore>) -> Self {
        Self { s3, files }
    }

    /// Build the store for a set of locations, creating an S3 client only if
    /// one of them needs it.
    pub async fn for_locations(aws: &AwsConfig, locations: &[&ObjectLocation]) -> Self {
        let s3: Option<Arc<dyn ObjectStore>> = if locations.iter().any(|l| l.is_s3()) {
            Some(Arc::new(S3ObjectStore::new(aws).await))
        } else {
            None
        };
        Self::new(s3, Arc::new(FilesystemObjectStore))
    }

    fn backend(&self, location: &ObjectLocation) -> Result<&dyn ObjectStore, StorageError> {
        match location {
            ObjectLocation::S3 { .. } => self.s3.as_deref().ok_or_else(|| {
                StorageError::InvalidLocation(format!("no S3 backend for {location}"))
            }),
            ObjectLocation::File(_) => Ok(self.files.as_ref()),
        }
    }
}

#[async_trait]
impl ObjectStore for RoutingObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError> {
        self.backend(location)?.get(location).await
    }

    async fn put(&self, location: &ObjectLocation, data: &[u8]) -> Result<(), StorageError> {
        self.backend(location)?.put(location, data).await
    }

    fn backend_name(&self) -> &'static str {
        "routing"
    }
}
