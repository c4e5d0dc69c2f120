//! Object storage error types

use thiserror::Error;

use crate::utils::faults::InjectedFault;
use crate::utils::retry::Retryable;

/// Errors from object storage operations (S3/filesystem/memory)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {location}")]
    NotFound { location: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid object location: {0}")]
    InvalidLocation(String),

    #[error(transparent)]
    Injected(#[from] InjectedFault),
}

impl Retryable for StorageError {
    /// A malformed location cannot be fixed by trying again.
    fn is_retryable(&self) -> bool {
        !matches!(self, StorageError::InvalidLocation(_))
    }
}
