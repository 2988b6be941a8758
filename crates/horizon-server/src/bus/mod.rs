//! Message bus carrying raw log payloads
//!
//! The pipeline consumes one subject of opaque bytes with at-least-once
//! semantics: a delivery that is not acknowledged is delivered again. Two
//! transports implement [`MessageBus`]:
//!
//! - [`MemoryBus`]: in-process channel, redelivers on nack up to a limit
//! - `KafkaBus` (`kafka` feature): consumer-group subscription with manual
//!   offset commits

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

pub mod config;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

pub use config::{BusConfig, BusTransport};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBus;
pub use memory::{BusStats, MemoryBus};

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Failed to connect to message bus: {0}")]
    Connect(String),

    #[error("Failed to publish to '{subject}': {message}")]
    Publish { subject: String, message: String },

    #[error("Failed to subscribe to '{subject}': {message}")]
    Subscribe { subject: String, message: String },

    #[error("Failed to receive from message bus: {0}")]
    Receive(String),

    #[error("Failed to settle delivery: {0}")]
    Settle(String),

    #[error("Subject '{0}' already has an active subscriber")]
    AlreadySubscribed(String),

    #[error("Transport '{0}' is not available in this build")]
    Unsupported(String),
}

/// What the consumer decided for a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with the message, successfully or permanently
    Ack,
    /// Leave unacknowledged so the bus delivers it again
    Nack,
}

/// One delivered message awaiting settlement
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    fn subject(&self) -> &str;

    /// 1 on first delivery
    fn attempt(&self) -> u32;

    async fn ack(self: Box<Self>) -> Result<(), BusError>;

    async fn nack(self: Box<Self>) -> Result<(), BusError>;

    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), BusError> {
        match disposition {
            Disposition::Ack => self.ack().await,
            Disposition::Nack => self.nack().await,
        }
    }
}

/// Stream of deliveries; dropping it ends the subscription
pub type DeliveryStream = BoxStream<'static, Result<Box<dyn Delivery>, BusError>>;

#[async_trait]
pub trait MessageBus: Send + Sync {
    fn subject(&self) -> &str;

    async fn publish(&self, payload: Vec<u8>) -> Result<(), BusError>;

    async fn subscribe(&self) -> Result<DeliveryStream, BusError>;
}

/// Build the transport selected by `config`
pub fn connect(config: &BusConfig) -> Result<Arc<dyn MessageBus>, BusError> {
    match config.transport {
        BusTransport::Memory => Ok(Arc::new(MemoryBus::new(&config.subject, config.max_deliver))),
        #[cfg(feature = "kafka")]
        BusTransport::Kafka => Ok(Arc::new(KafkaBus::new(
            &config.kafka_brokers,
            &config.kafka_group_id,
            &config.subject,
        )?)),
        #[cfg(not(feature = "kafka"))]
        BusTransport::Kafka => Err(BusError::Unsupported(
            "kafka (rebuild with --features kafka)".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_memory_transport() {
        let bus = connect(&BusConfig::default()).unwrap();
        assert_eq!(bus.subject(), "logs.raw");
    }

    #[cfg(not(feature = "kafka"))]
    #[test]
    fn test_connect_kafka_without_feature() {
        let config = BusConfig {
            transport: BusTransport::Kafka,
            ..BusConfig::default()
        };
        assert!(matches!(connect(&config), Err(BusError::Unsupported(_))));
    }
}
