//! Per-message pipeline and the bus consumption loop

use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{IngestError, MissingMappingPolicy, NormalizeAndStore, ProcessOutcome};
use crate::bus::{BusError, Delivery, Disposition, MessageBus};
use crate::db::{
    MappingCatalog, NormalizedEventStore, PgMappingCatalog, PgNormalizedEventStore,
    PgReferenceLedger, ReferenceLedger,
};
use crate::models::RawLogReference;
use crate::storage::{staging_key, StagingStore, JSON_CONTENT_TYPE};

/// Value used when a payload does not name its source or source type
pub const UNKNOWN_SOURCE: &str = "unknown";

const RECEIVE_BACKOFF: Duration = Duration::from_millis(250);

/// Store handles the pipeline writes through
#[derive(Clone)]
pub struct PipelineStores {
    pub staging: Arc<dyn StagingStore>,
    pub ledger: Arc<dyn ReferenceLedger>,
    pub catalog: Arc<dyn MappingCatalog>,
    pub events: Arc<dyn NormalizedEventStore>,
}

impl PipelineStores {
    /// Postgres-backed ledger, catalog and event store sharing one pool
    pub fn postgres(pool: PgPool, staging: Arc<dyn StagingStore>) -> Self {
        Self {
            staging,
            ledger: Arc::new(PgReferenceLedger::new(pool.clone())),
            catalog: Arc::new(PgMappingCatalog::new(pool.clone())),
            events: Arc::new(PgNormalizedEventStore::new(pool)),
        }
    }
}

/// Source attribution read from the top level of a raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEnvelope {
    pub source: String,
    pub source_type: String,
}

impl LogEnvelope {
    /// Parse `payload` as a JSON object and read `source` and `source_type`
    ///
    /// Missing or non-string fields fall back to [`UNKNOWN_SOURCE`]. Anything
    /// that is not a JSON object is rejected.
    pub fn parse(payload: &[u8]) -> Result<Self, String> {
        let value: Value = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
        let object = value
            .as_object()
            .ok_or_else(|| "payload is not a JSON object".to_string())?;

        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_SOURCE)
                .to_string()
        };

        Ok(Self {
            source: field("source"),
            source_type: field("source_type"),
        })
    }
}

/// How a single delivery ended
#[derive(Debug)]
pub enum Outcome {
    /// Staged, recorded and normalized
    Processed {
        reference_id: Uuid,
        event_id: Option<Uuid>,
    },
    /// Payload can never be normalized; the staged copy is kept
    Malformed { staging_key: String },
    /// No mapping yet; the reference stays pending for replay
    Deferred {
        reference_id: Uuid,
        source_type: String,
    },
    Failed(IngestError),
}

impl Outcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Processed { .. } | Self::Malformed { .. } | Self::Deferred { .. } => {
                Disposition::Ack
            }
            Self::Failed(_) => Disposition::Nack,
        }
    }
}

/// Stage, record and normalize raw payloads
pub struct IngestionPipeline {
    staging: Arc<dyn StagingStore>,
    ledger: Arc<dyn ReferenceLedger>,
    processor: NormalizeAndStore,
    missing_mapping: MissingMappingPolicy,
}

impl IngestionPipeline {
    pub fn new(stores: PipelineStores, missing_mapping: MissingMappingPolicy) -> Self {
        let processor = NormalizeAndStore::new(
            Arc::clone(&stores.staging),
            stores.catalog,
            stores.events,
            Arc::clone(&stores.ledger),
        );

        Self {
            staging: stores.staging,
            ledger: stores.ledger,
            processor,
            missing_mapping,
        }
    }

    pub fn processor(&self) -> &NormalizeAndStore {
        &self.processor
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn ReferenceLedger> {
        &self.ledger
    }

    /// Run one raw payload through the pipeline
    ///
    /// Never panics and never returns early without an [`Outcome`]; the
    /// caller settles the delivery from [`Outcome::disposition`].
    #[instrument(skip(self, payload), fields(size_bytes = payload.len()))]
    pub async fn handle_payload(&self, payload: &[u8]) -> Outcome {
        let reference_id = Uuid::new_v4();
        let received_at = Utc::now();
        let key = staging_key(reference_id, received_at);

        let staged = match self
            .staging
            .put(&key, payload.to_vec(), JSON_CONTENT_TYPE)
            .await
        {
            Ok(staged) => staged,
            Err(source) => {
                let err = IngestError::StagingWriteFailure {
                    key: key.clone(),
                    source,
                };
                error!(
                    reference_id = %reference_id,
                    staging_key = %key,
                    error = %err,
                    "Failed to stage raw log, leaving for redelivery"
                );
                return Outcome::Failed(err);
            }
        };

        let envelope = match LogEnvelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(reason) => {
                warn!(
                    reference_id = %reference_id,
                    staging_key = %key,
                    error = %reason,
                    "Discarding malformed raw log, staged copy kept"
                );
                return Outcome::Malformed { staging_key: key };
            }
        };

        let reference = RawLogReference::new(
            reference_id,
            envelope.source,
            envelope.source_type,
            &staged,
            received_at,
        );

        if let Err(source) = self.ledger.insert(&reference).await {
            let err = IngestError::ReferenceWriteFailure {
                reference_id,
                source,
            };
            error!(
                reference_id = %reference_id,
                staging_key = %key,
                source_type = %reference.source_type,
                error = %err,
                "Failed to record raw log reference"
            );
            return Outcome::Failed(err);
        }

        debug!(
            reference_id = %reference_id,
            staging_key = %key,
            source_type = %reference.source_type,
            size_bytes = staged.size,
            "Raw log staged"
        );

        let result = self.processor.process(&reference).await;
        self.settle_processing(&reference, result)
    }

    fn settle_processing(
        &self,
        reference: &RawLogReference,
        result: Result<ProcessOutcome, IngestError>,
    ) -> Outcome {
        let err = match result {
            Ok(ProcessOutcome::Stored { event_id }) => {
                return Outcome::Processed {
                    reference_id: reference.id,
                    event_id: Some(event_id),
                }
            }
            Ok(ProcessOutcome::AlreadyProcessed) => {
                return Outcome::Processed {
                    reference_id: reference.id,
                    event_id: None,
                }
            }
            Err(err) => err,
        };

        match err {
            IngestError::MappingNotFound(source_type)
                if self.missing_mapping == MissingMappingPolicy::Acknowledge =>
            {
                warn!(
                    reference_id = %reference.id,
                    staging_key = %reference.staging_key,
                    source_type = %source_type,
                    "No enabled mapping, reference left pending for replay"
                );
                Outcome::Deferred {
                    reference_id: reference.id,
                    source_type,
                }
            }
            IngestError::MalformedPayload(reason) => {
                warn!(
                    reference_id = %reference.id,
                    staging_key = %reference.staging_key,
                    source_type = %reference.source_type,
                    error = %reason,
                    "Staged raw log cannot be normalized"
                );
                Outcome::Malformed {
                    staging_key: reference.staging_key.clone(),
                }
            }
            err => {
                error!(
                    reference_id = %reference.id,
                    staging_key = %reference.staging_key,
                    source_type = %reference.source_type,
                    kind = err.kind(),
                    error = %err,
                    "Failed to normalize raw log, leaving for redelivery"
                );
                Outcome::Failed(err)
            }
        }
    }
}

/// Handle one delivery and settle it on the bus
pub async fn handle_delivery(pipeline: &IngestionPipeline, delivery: Box<dyn Delivery>) -> Disposition {
    let attempt = delivery.attempt();
    let outcome = pipeline.handle_payload(delivery.payload()).await;
    let disposition = outcome.disposition();

    if let Err(e) = delivery.settle(disposition).await {
        error!(attempt, ?disposition, error = %e, "Failed to settle delivery");
    }

    disposition
}

/// Bus subscription loop feeding deliveries to the pipeline
pub struct IngestionConsumer {
    pipeline: Arc<IngestionPipeline>,
    bus: Arc<dyn MessageBus>,
    max_in_flight: usize,
}

impl IngestionConsumer {
    pub fn new(
        pipeline: Arc<IngestionPipeline>,
        bus: Arc<dyn MessageBus>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            pipeline,
            bus,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Consume until `shutdown` fires or the subscription ends
    ///
    /// At most `max_in_flight` deliveries are handled at once. On shutdown
    /// the subscription is dropped first, then every in-flight handler is
    /// awaited to completion.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BusError> {
        let mut deliveries = self.bus.subscribe().await?;
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut in_flight = JoinSet::new();

        info!(
            subject = %self.bus.subject(),
            max_in_flight = self.max_in_flight,
            "Ingestion consumer started"
        );

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }

            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = deliveries.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to receive delivery");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => continue,
                    }
                }
                None => {
                    info!("Subscription ended");
                    break;
                }
            };

            let pipeline = Arc::clone(&self.pipeline);
            in_flight.spawn(async move {
                let _permit = permit;
                handle_delivery(&pipeline, delivery).await
            });
        }

        drop(deliveries);
        info!(
            in_flight = in_flight.len(),
            "Ingestion consumer stopping, waiting for in-flight messages"
        );

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }

        info!("Ingestion consumer stopped");
        Ok(())
    }
}

fn log_join(joined: Result<Disposition, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Delivery handler task failed");
    }
}
