//! Failure taxonomy of the ingestion pipeline

use thiserror::Error;
use uuid::Uuid;

use crate::db::DbError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to stage raw log at '{key}': {source}")]
    StagingWriteFailure { key: String, source: StorageError },

    #[error("Failed to read staged raw log '{key}': {source}")]
    StagingReadFailure { key: String, source: StorageError },

    #[error("Malformed raw log payload: {0}")]
    MalformedPayload(String),

    #[error("Failed to record raw log reference {reference_id}: {source}")]
    ReferenceWriteFailure { reference_id: Uuid, source: DbError },

    #[error("No enabled mapping for source type '{0}'")]
    MappingNotFound(String),

    #[error("Mapping lookup failed for source type '{source_type}': {source}")]
    MappingLookupFailure { source_type: String, source: DbError },

    #[error("Mapping '{mapping}' has a malformed config")]
    MappingConfigMalformed { mapping: String },

    #[error("Failed to store normalized event for reference {reference_id}: {source}")]
    NormalizedWriteFailure { reference_id: Uuid, source: DbError },

    #[error("Failed to mark reference {reference_id} processed: {source}")]
    LedgerUpdateFailure { reference_id: Uuid, source: DbError },

    #[error("Failed to list pending references: {source}")]
    LedgerReadFailure { source: DbError },
}

impl IngestError {
    /// Stable name for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StagingWriteFailure { .. } => "staging_write_failure",
            Self::StagingReadFailure { .. } => "staging_read_failure",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::ReferenceWriteFailure { .. } => "reference_write_failure",
            Self::MappingNotFound(_) => "mapping_not_found",
            Self::MappingLookupFailure { .. } => "mapping_lookup_failure",
            Self::MappingConfigMalformed { .. } => "mapping_config_malformed",
            Self::NormalizedWriteFailure { .. } => "normalized_write_failure",
            Self::LedgerUpdateFailure { .. } => "ledger_update_failure",
            Self::LedgerReadFailure { .. } => "ledger_read_failure",
        }
    }
}
