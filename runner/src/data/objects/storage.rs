//! Object storage trait definition

use async_trait::async_trait;

use super::error::StorageError;
use super::location::ObjectLocation;

/// Trait for object storage backends
///
/// All implementations must be thread-safe (Send + Sync) for use in async contexts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full object at `location`
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError>;

    /// Write `data` to `location`, replacing any existing object
    async fn put(&self, location: &ObjectLocation, data: &[u8]) -> Result<(), StorageError>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
