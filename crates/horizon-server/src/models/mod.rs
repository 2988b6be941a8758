//! Records shared by the pipeline stores and the HTTP surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::ocsf::{CanonicalEvent, MappingBody};
use crate::storage::StagedObject;

/// Ledger row for one raw message durably written to staging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RawLogReference {
    pub id: Uuid,
    pub source: String,
    pub source_type: String,
    pub staging_key: String,
    pub size_bytes: i64,
    /// SHA-256 hex digest of the staged bytes
    pub content_sha256: String,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl RawLogReference {
    /// Unprocessed reference for a freshly staged object
    pub fn new(
        id: Uuid,
        source: impl Into<String>,
        source_type: impl Into<String>,
        staged: &StagedObject,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            source_type: source_type.into(),
            staging_key: staged.key.clone(),
            size_bytes: staged.size,
            content_sha256: staged.checksum.clone(),
            received_at,
            processed: false,
            processed_at: None,
        }
    }
}

/// Field-mapping configuration for one source type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LogMapping {
    pub id: Uuid,
    pub name: String,
    pub source_type: String,
    pub mapping_config: serde_json::Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogMapping {
    pub fn body(&self) -> MappingBody {
        MappingBody::new(self.mapping_config.clone())
    }
}

/// Canonical event ready to be written to the event store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedLog {
    pub id: Uuid,
    pub raw_log_id: Uuid,
    pub event: CanonicalEvent,
}

impl NormalizedLog {
    pub fn new(raw_log_id: Uuid, event: CanonicalEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_log_id,
            event,
        }
    }
}
