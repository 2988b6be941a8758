//! Ingestion pipeline: bus delivery to staged blob, ledger row and
//! normalized event
//!
//! ```text
//! bus ─► stage raw bytes ─► parse envelope ─► ledger insert ─► NormalizeAndStore ─► ack
//!          │ fail: nack        │ fail: ack        │ fail: nack       │ fail: nack
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod processor;
pub mod replay;

pub use config::{IngestConfig, MissingMappingPolicy};
pub use consumer::{
    handle_delivery, IngestionConsumer, IngestionPipeline, LogEnvelope, Outcome, PipelineStores,
    UNKNOWN_SOURCE,
};
pub use error::IngestError;
pub use processor::{NormalizeAndStore, ProcessOutcome};
pub use replay::ReplaySummary;
