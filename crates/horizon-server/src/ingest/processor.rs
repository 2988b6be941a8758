//! Normalize a staged raw log and persist the canonical event
//!
//! Works from a ledger reference alone, so it runs both inline after a
//! message is staged and later when replaying pending references.

use horizon_common::checksum::{matches_sha256, sha256_hex};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::IngestError;
use crate::db::{MappingCatalog, NormalizedEventStore, ReferenceLedger};
use crate::models::{NormalizedLog, RawLogReference};
use crate::ocsf::{normalize, NormalizeError};
use crate::storage::{StagingStore, StorageError};

/// Result of a successful [`NormalizeAndStore::process`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Stored { event_id: Uuid },
    /// The reference was processed before; nothing was written
    AlreadyProcessed,
}

#[derive(Clone)]
pub struct NormalizeAndStore {
    staging: Arc<dyn StagingStore>,
    catalog: Arc<dyn MappingCatalog>,
    events: Arc<dyn NormalizedEventStore>,
    ledger: Arc<dyn ReferenceLedger>,
}

impl NormalizeAndStore {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        catalog: Arc<dyn MappingCatalog>,
        events: Arc<dyn NormalizedEventStore>,
        ledger: Arc<dyn ReferenceLedger>,
    ) -> Self {
        Self {
            staging,
            catalog,
            events,
            ledger,
        }
    }

    /// Download, normalize and persist the payload behind `reference`
    ///
    /// Steps run strictly in order and stop at the first failure. Staged
    /// bytes whose SHA-256 differs from the recorded digest are rejected as a
    /// staging read failure and nothing is normalized. The event
    /// is written before the reference is flipped, so a failure between the
    /// two leaves the reference pending and a replay writes a second event.
    #[instrument(
        skip(self, reference),
        fields(
            reference_id = %reference.id,
            staging_key = %reference.staging_key,
            source_type = %reference.source_type
        )
    )]
    pub async fn process(&self, reference: &RawLogReference) -> Result<ProcessOutcome, IngestError> {
        if reference.processed {
            debug!("Reference already processed, skipping");
            return Ok(ProcessOutcome::AlreadyProcessed);
        }

        let bytes = self
            .staging
            .get(&reference.staging_key)
            .await
            .map_err(|source| IngestError::StagingReadFailure {
                key: reference.staging_key.clone(),
                source,
            })?;

        if !matches_sha256(&bytes, &reference.content_sha256) {
            let actual = sha256_hex(&bytes);
            warn!(
                expected = %reference.content_sha256,
                actual = %actual,
                size_bytes = bytes.len(),
                "Staged payload does not match recorded checksum"
            );
            return Err(IngestError::StagingReadFailure {
                key: reference.staging_key.clone(),
                source: StorageError::ChecksumMismatch {
                    key: reference.staging_key.clone(),
                    expected: reference.content_sha256.clone(),
                    actual,
                },
            });
        }

        let mapping = self
            .catalog
            .find_enabled(&reference.source_type)
            .await
            .map_err(|source| IngestError::MappingLookupFailure {
                source_type: reference.source_type.clone(),
                source,
            })?
            .ok_or_else(|| IngestError::MappingNotFound(reference.source_type.clone()))?;

        let raw: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;

        let mut event = normalize(&raw, &mapping.body()).map_err(|e| match e {
            NormalizeError::MalformedPayload => IngestError::MalformedPayload(e.to_string()),
            NormalizeError::MappingConfigMalformed => IngestError::MappingConfigMalformed {
                mapping: mapping.name.clone(),
            },
        })?;
        event.time = Some(reference.received_at);

        let record = NormalizedLog::new(reference.id, event);
        self.events
            .insert(&record)
            .await
            .map_err(|source| IngestError::NormalizedWriteFailure {
                reference_id: reference.id,
                source,
            })?;

        let flipped = self
            .ledger
            .mark_processed(reference.id)
            .await
            .map_err(|source| IngestError::LedgerUpdateFailure {
                reference_id: reference.id,
                source,
            })?;

        if !flipped {
            warn!("Reference was marked processed concurrently");
        }

        info!(
            event_id = %record.id,
            mapping = %mapping.name,
            severity_id = record.event.severity_id,
            "Raw log normalized"
        );

        Ok(ProcessOutcome::Stored {
            event_id: record.id,
        })
    }
}
