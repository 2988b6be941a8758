//! In-memory store implementations
//!
//! Behave like their Postgres counterparts for the operations the pipeline
//! uses, including the processed-once guard and oldest-first ordering.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DbError, DbResult, MappingCatalog, NormalizedEventStore, ReferenceLedger};
use crate::models::{LogMapping, NormalizedLog, RawLogReference};

#[derive(Debug, Default)]
pub struct MemoryReferenceLedger {
    rows: RwLock<HashMap<Uuid, RawLogReference>>,
}

impl MemoryReferenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Every reference, oldest first
    pub async fn all(&self) -> Vec<RawLogReference> {
        let mut rows: Vec<RawLogReference> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| (a.received_at, a.id).cmp(&(b.received_at, b.id)));
        rows
    }
}

#[async_trait]
impl ReferenceLedger for MemoryReferenceLedger {
    async fn insert(&self, reference: &RawLogReference) -> DbResult<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&reference.id)
            || rows.values().any(|r| r.staging_key == reference.staging_key)
        {
            return Err(DbError::duplicate("Raw log reference", &reference.staging_key));
        }
        rows.insert(reference.id, reference.clone());
        Ok(())
    }

    async fn mark_processed(&self, id: Uuid) -> DbResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) if !row.processed => {
                row.processed = true;
                row.processed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: Uuid) -> DbResult<Option<RawLogReference>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_unprocessed(&self, limit: i64) -> DbResult<Vec<RawLogReference>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|r| !r.processed)
            .take(limit)
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMappingCatalog {
    mappings: RwLock<Vec<LogMapping>>,
}

impl MemoryMappingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, mapping: LogMapping) {
        self.mappings.write().await.push(mapping);
    }

    /// Register an enabled mapping for `source_type` and return it
    pub async fn add(
        &self,
        name: &str,
        source_type: &str,
        mapping_config: serde_json::Value,
    ) -> LogMapping {
        let now = Utc::now();
        let mapping = LogMapping {
            id: Uuid::new_v4(),
            name: name.to_string(),
            source_type: source_type.to_string(),
            mapping_config,
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        self.insert(mapping.clone()).await;
        mapping
    }
}

#[async_trait]
impl MappingCatalog for MemoryMappingCatalog {
    async fn find_enabled(&self, source_type: &str) -> DbResult<Option<LogMapping>> {
        Ok(self
            .mappings
            .read()
            .await
            .iter()
            .filter(|m| m.enabled && m.source_type == source_type)
            .min_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<NormalizedLog>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Stored events in insertion order
    pub async fn all(&self) -> Vec<NormalizedLog> {
        self.events.read().await.clone()
    }

    pub async fn for_reference(&self, raw_log_id: Uuid) -> Vec<NormalizedLog> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.raw_log_id == raw_log_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NormalizedEventStore for MemoryEventStore {
    async fn insert(&self, log: &NormalizedLog) -> DbResult<()> {
        self.events.write().await.push(log.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocsf::CanonicalEvent;
    use crate::storage::StagedObject;
    use chrono::Duration;
    use serde_json::json;

    fn reference(offset_secs: i64) -> RawLogReference {
        let id = Uuid::new_v4();
        let staged = StagedObject {
            key: format!("raw-logs/{}.json", id),
            checksum: "00".to_string(),
            size: 2,
        };
        RawLogReference::new(
            id,
            "fw1",
            "firewall",
            &staged,
            Utc::now() + Duration::seconds(offset_secs),
        )
    }

    #[tokio::test]
    async fn test_ledger_mark_processed_once() {
        let ledger = MemoryReferenceLedger::new();
        let r = reference(0);
        ledger.insert(&r).await.unwrap();

        assert!(ledger.mark_processed(r.id).await.unwrap());
        assert!(!ledger.mark_processed(r.id).await.unwrap());
        assert!(!ledger.mark_processed(Uuid::new_v4()).await.unwrap());

        let stored = ledger.get(r.id).await.unwrap().unwrap();
        assert!(stored.processed);
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_ledger_rejects_duplicate_staging_key() {
        let ledger = MemoryReferenceLedger::new();
        let r = reference(0);
        ledger.insert(&r).await.unwrap();

        let mut dup = r.clone();
        dup.id = Uuid::new_v4();
        assert!(matches!(ledger.insert(&dup).await, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_ledger_lists_unprocessed_oldest_first() {
        let ledger = MemoryReferenceLedger::new();
        let newest = reference(30);
        let oldest = reference(-30);
        let middle = reference(0);
        for r in [&newest, &oldest, &middle] {
            ledger.insert(r).await.unwrap();
        }
        ledger.mark_processed(middle.id).await.unwrap();

        let pending = ledger.list_unprocessed(10).await.unwrap();
        let ids: Vec<Uuid> = pending.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![oldest.id, newest.id]);

        assert_eq!(ledger.list_unprocessed(1).await.unwrap().len(), 1);
        assert!(ledger.list_unprocessed(0).await.unwrap().is_empty());
        assert!(ledger.list_unprocessed(-5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_returns_oldest_enabled_mapping() {
        let catalog = MemoryMappingCatalog::new();
        let base = Utc::now();
        let mapping = |name: &str, enabled: bool, offset_secs: i64| LogMapping {
            id: Uuid::new_v4(),
            name: name.to_string(),
            source_type: "firewall".to_string(),
            mapping_config: json!({"field_mappings": {}}),
            enabled,
            created_at: base + Duration::seconds(offset_secs),
            updated_at: base,
        };

        let newer = mapping("fw-v2", true, 5);
        let older = mapping("fw-v1", true, 0);
        let disabled = mapping("fw-old", false, -60);
        catalog.insert(newer).await;
        catalog.insert(older.clone()).await;
        catalog.insert(disabled).await;

        let found = catalog.find_enabled("firewall").await.unwrap().unwrap();
        assert_eq!(found.id, older.id);
        assert!(catalog.find_enabled("proxy").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_event_store_filters_by_reference() {
        let store = MemoryEventStore::new();
        let raw_log_id = Uuid::new_v4();
        store
            .insert(&NormalizedLog::new(raw_log_id, CanonicalEvent::default()))
            .await
            .unwrap();
        store
            .insert(&NormalizedLog::new(Uuid::new_v4(), CanonicalEvent::default()))
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.for_reference(raw_log_id).await.len(), 1);
    }
}
