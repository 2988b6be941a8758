//! Shared fixtures for the pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use horizon_server::db::memory::{MemoryEventStore, MemoryMappingCatalog, MemoryReferenceLedger};
use horizon_server::db::{
    DbError, DbResult, MappingCatalog, NormalizedEventStore, ReferenceLedger,
};
use horizon_server::ingest::{IngestionPipeline, MissingMappingPolicy, PipelineStores};
use horizon_server::models::{LogMapping, NormalizedLog, RawLogReference};
use horizon_server::storage::{MemoryStagingStore, StagedObject, StagingStore, StorageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// In-memory stores plus a pipeline wired to them
pub struct Harness {
    pub staging: Arc<MemoryStagingStore>,
    pub ledger: Arc<MemoryReferenceLedger>,
    pub catalog: Arc<MemoryMappingCatalog>,
    pub events: Arc<MemoryEventStore>,
    pub pipeline: Arc<IngestionPipeline>,
}

impl Harness {
    pub fn new(policy: MissingMappingPolicy) -> Self {
        let staging = Arc::new(MemoryStagingStore::new());
        let ledger = Arc::new(MemoryReferenceLedger::new());
        let catalog = Arc::new(MemoryMappingCatalog::new());
        let events = Arc::new(MemoryEventStore::new());

        let stores = PipelineStores {
            staging: staging.clone(),
            ledger: ledger.clone(),
            catalog: catalog.clone(),
            events: events.clone(),
        };

        Self {
            staging,
            ledger,
            catalog,
            events,
            pipeline: Arc::new(IngestionPipeline::new(stores, policy)),
        }
    }

    /// Same in-memory stores, with `replace` swapping one of them out
    pub fn pipeline_with(
        &self,
        policy: MissingMappingPolicy,
        replace: impl FnOnce(&mut PipelineStores),
    ) -> IngestionPipeline {
        let mut stores = PipelineStores {
            staging: self.staging.clone(),
            ledger: self.ledger.clone(),
            catalog: self.catalog.clone(),
            events: self.events.clone(),
        };
        replace(&mut stores);
        IngestionPipeline::new(stores, policy)
    }
}

fn pool_timeout() -> DbError {
    DbError::Sqlx(sqlx::Error::PoolTimedOut)
}

/// Staging store whose writes always fail
pub struct FailingStagingStore;

#[async_trait]
impl StagingStore for FailingStagingStore {
    async fn put(
        &self,
        _key: &str,
        _data: Vec<u8>,
        _content_type: &str,
    ) -> Result<StagedObject, StorageError> {
        Err(StorageError::Backend(anyhow::anyhow!("object store unreachable")))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Ledger whose inserts always fail
pub struct FailingLedger;

#[async_trait]
impl ReferenceLedger for FailingLedger {
    async fn insert(&self, _reference: &RawLogReference) -> DbResult<()> {
        Err(pool_timeout())
    }

    async fn mark_processed(&self, _id: Uuid) -> DbResult<bool> {
        Err(pool_timeout())
    }

    async fn get(&self, _id: Uuid) -> DbResult<Option<RawLogReference>> {
        Ok(None)
    }

    async fn list_unprocessed(&self, _limit: i64) -> DbResult<Vec<RawLogReference>> {
        Err(pool_timeout())
    }
}

/// Staging store that accepts writes but cannot read them back
pub struct UnreadableStagingStore {
    pub inner: Arc<MemoryStagingStore>,
}

#[async_trait]
impl StagingStore for UnreadableStagingStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StagedObject, StorageError> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Backend(anyhow::anyhow!("read timed out")))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }
}

/// Ledger that records references but fails to flip them
pub struct UnflippableLedger {
    pub inner: Arc<MemoryReferenceLedger>,
}

#[async_trait]
impl ReferenceLedger for UnflippableLedger {
    async fn insert(&self, reference: &RawLogReference) -> DbResult<()> {
        self.inner.insert(reference).await
    }

    async fn mark_processed(&self, _id: Uuid) -> DbResult<bool> {
        Err(pool_timeout())
    }

    async fn get(&self, id: Uuid) -> DbResult<Option<RawLogReference>> {
        self.inner.get(id).await
    }

    async fn list_unprocessed(&self, limit: i64) -> DbResult<Vec<RawLogReference>> {
        self.inner.list_unprocessed(limit).await
    }
}

/// Catalog whose lookups always fail
pub struct FailingCatalog;

#[async_trait]
impl MappingCatalog for FailingCatalog {
    async fn find_enabled(&self, _source_type: &str) -> DbResult<Option<LogMapping>> {
        Err(pool_timeout())
    }
}

/// Event store whose inserts always fail
pub struct FailingEventStore;

#[async_trait]
impl NormalizedEventStore for FailingEventStore {
    async fn insert(&self, _log: &NormalizedLog) -> DbResult<()> {
        Err(pool_timeout())
    }
}

/// Staging store that delays every write and tracks how many overlap
pub struct SlowStagingStore {
    inner: MemoryStagingStore,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
}

impl SlowStagingStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStagingStore::new(),
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        }
    }

    /// Highest number of writes observed in progress at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StagingStore for SlowStagingStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StagedObject, StorageError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let result = self.inner.put(key, data, content_type).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }
}

/// Poll `condition` every few milliseconds until it holds or five seconds pass
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached within 5s");
}
