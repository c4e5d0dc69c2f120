//! S3-based object storage implementation
//!
//! Works against AWS S3 or S3-compatible services (MinIO, LocalStack) when a
//! custom endpoint is configured.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use super::error::StorageError;
use super::location::ObjectLocation;
use super::storage::ObjectStore;
use crate::core::{AwsConfig, AwsService};
use crate::data::aws::load_sdk_config;

/// S3-based object storage
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create a new S3 store with the given client configuration
    pub async fn new(aws: &AwsConfig) -> Self {
        let config = load_sdk_config(aws).await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&config);
        let endpoint_url = aws.endpoint_url_for(AwsService::S3);
        if let Some(endpoint_url) = endpoint_url {
            s3_config = s3_config
                .endpoint_url(endpoint_url)
                .force_path_style(true); // Required for most S3-compatible services
        }

        tracing::debug!(
            endpoint = endpoint_url.unwrap_or("default"),
            "S3 object store initialized"
        );

        Self {
            client: Client::from_conf(s3_config.build()),
        }
    }

    fn bucket_and_key(location: &ObjectLocation) -> Result<(&str, &str), StorageError> {
        match location {
            ObjectLocation::S3 { bucket, key } => Ok((bucket, key)),
            other => Err(StorageError::InvalidLocation(format!(
                "not an S3 location: {other}"
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, StorageError> {
        let (bucket, key) = Self::bucket_and_key(location)?;

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound {
                        location: location.to_string(),
                    }
                } else {
                    StorageError::Backend(format!("S3 get_object error: {}", service_err))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 body read error: {}", e)))?
            .into_bytes()
            .to_vec();

        tracing::debug!(bucket, key, size = data.len(), "Object read from S3");
        Ok(data)
    }

    async fn put(&self, location: &ObjectLocation, data: &[u8]) -> Result<(), StorageError> {
        let (bucket, key) = Self::bucket_and_key(location)?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 put_object error: {}", e)))?;

        tracing::debug!(bucket, key, size = data.len(), "Object written to S3");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
