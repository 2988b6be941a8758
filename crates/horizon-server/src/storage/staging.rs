//! Staging store contract and key layout

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StorageError;

/// Content type recorded for every staged raw log
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Prefix under which raw payloads are staged
pub const STAGING_PREFIX: &str = "raw-logs";

/// Location and digest of a staged payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObject {
    pub key: String,
    /// SHA-256 hex digest of the staged bytes
    pub checksum: String,
    pub size: i64,
}

/// Path-addressed blob store for raw payloads
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Durably write `data` at `key`
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StagedObject, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// `raw-logs/YYYY/MM/DD/HH-MM-SS/<id>.json`, bucketed by receipt time
pub fn staging_key(id: Uuid, received_at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}.json",
        STAGING_PREFIX,
        received_at.format("%Y/%m/%d/%H-%M-%S"),
        id
    )
}
