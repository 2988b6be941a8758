//! Staging storage for raw log payloads
//!
//! Raw bytes are written here before anything else touches them. The
//! pipeline talks to the [`StagingStore`] trait; [`Storage`] is the
//! S3-compatible implementation and [`MemoryStagingStore`] backs tests and
//! local runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use horizon_common::checksum::sha256_hex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub mod config;
pub mod memory;
pub mod staging;

pub use memory::MemoryStagingStore;
pub use staging::{staging_key, StagedObject, StagingStore, JSON_CONTENT_TYPE};

/// Errors surfaced by staging stores
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object '{0}' not found in staging")]
    NotFound(String),

    #[error("Staged object '{key}' has checksum {actual}, expected {expected}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Staging backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// S3-compatible object storage client
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Result<Self> {
        debug!(
            endpoint = ?config.endpoint,
            region = %config.region,
            path_style = config.path_style,
            "Initializing storage"
        );

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "horizon-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(bucket = %config.bucket, "Storage client initialized");

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, size = data.len()))]
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<StagedObject> {
        let checksum = sha256_hex(&data);
        let size = data.len() as i64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request.send().await.context("Failed to upload to S3")?;

        debug!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);

        Ok(StagedObject {
            key: key.to_string(),
            checksum,
            size,
        })
    }

    /// Fetch an object; a missing key is [`StorageError::NotFound`]
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn download(&self, key: &str) -> std::result::Result<Vec<u8>, StorageError> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Err(StorageError::NotFound(key.to_string()));
            },
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to download from S3: {}", key))
                    .into());
            },
        };

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete from S3: {}", key))?;

        info!("Deleted s3://{}/{}", self.bucket, key);

        Ok(())
    }
}

#[async_trait]
impl StagingStore for Storage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> std::result::Result<StagedObject, StorageError> {
        Ok(self.upload(key, data, Some(content_type)).await?)
    }

    async fn get(&self, key: &str) -> std::result::Result<Vec<u8>, StorageError> {
        self.download(key).await
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), StorageError> {
        Ok(Storage::delete(self, key).await?)
    }
}

/// Build the staging store selected by `config`
pub async fn init(config: config::StorageConfig) -> Result<Arc<dyn StagingStore>> {
    match config.backend {
        config::StagingBackend::S3 => Ok(Arc::new(Storage::new(config).await?)),
        config::StagingBackend::Memory => {
            info!("Using in-memory staging store; staged payloads are not durable");
            Ok(Arc::new(MemoryStagingStore::new()))
        }
    }
}
