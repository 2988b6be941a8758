//! Kafka transport
//!
//! Offsets are committed manually: `ack` commits the offset after the
//! message, `nack` seeks the partition back to the message so the consumer
//! reads it again. Deliveries are handled concurrently, so an ack may
//! commit past an earlier message on the same partition that is still in
//! flight; a crash in that window loses the earlier message's redelivery.

use async_trait::async_trait;
use futures::stream;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{Message, OwnedMessage},
    producer::{FutureProducer, FutureRecord},
    ClientConfig, Offset, TopicPartitionList,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{BusError, Delivery, DeliveryStream, MessageBus};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const PREFETCH: usize = 256;

pub struct KafkaBus {
    brokers: String,
    group_id: String,
    topic: String,
    producer: FutureProducer,
}

impl KafkaBus {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| BusError::Connect(format!("create producer: {}", e)))?;

        info!(brokers = %brokers, topic = %topic, "Kafka producer created");

        Ok(Self {
            brokers: brokers.to_string(),
            group_id: group_id.to_string(),
            topic: topic.to_string(),
            producer,
        })
    }

    fn create_consumer(&self) -> Result<StreamConsumer, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| BusError::Connect(format!("create consumer: {}", e)))?;

        consumer.subscribe(&[&self.topic]).map_err(|e| BusError::Subscribe {
            subject: self.topic.clone(),
            message: e.to_string(),
        })?;

        Ok(consumer)
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    fn subject(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<(), BusError> {
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(&payload);

        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(e, _)| BusError::Publish {
                subject: self.topic.clone(),
                message: e.to_string(),
            })
    }

    async fn subscribe(&self) -> Result<DeliveryStream, BusError> {
        let consumer = Arc::new(self.create_consumer()?);
        let (tx, rx) = mpsc::channel::<Result<OwnedMessage, BusError>>(PREFETCH);

        // Pump messages off the consumer until the delivery stream is dropped
        let pump = Arc::clone(&consumer);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = pump.recv() => {
                        let item = received
                            .map(|m| m.detach())
                            .map_err(|e| BusError::Receive(e.to_string()));
                        if let Err(ref e) = item {
                            warn!(error = %e, "Kafka receive error");
                        }
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Kafka subscription pump stopped");
        });

        let deliveries = stream::unfold((rx, consumer), |(mut rx, consumer)| async move {
            let item = rx.recv().await?;
            let delivery = item.map(|message| {
                Box::new(KafkaDelivery {
                    consumer: Arc::clone(&consumer),
                    message,
                }) as Box<dyn Delivery>
            });
            Some((delivery, (rx, consumer)))
        });

        Ok(Box::pin(deliveries))
    }
}

struct KafkaDelivery {
    consumer: Arc<StreamConsumer>,
    message: OwnedMessage,
}

#[async_trait]
impl Delivery for KafkaDelivery {
    fn payload(&self) -> &[u8] {
        self.message.payload().unwrap_or_default()
    }

    fn subject(&self) -> &str {
        self.message.topic()
    }

    fn attempt(&self) -> u32 {
        // Kafka does not track per-message delivery counts
        1
    }

    async fn ack(self: Box<Self>) -> Result<(), BusError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                self.message.topic(),
                self.message.partition(),
                Offset::Offset(self.message.offset() + 1),
            )
            .map_err(|e| BusError::Settle(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| {
                error!(
                    topic = %self.message.topic(),
                    partition = self.message.partition(),
                    offset = self.message.offset(),
                    error = %e,
                    "Failed to commit offset"
                );
                BusError::Settle(e.to_string())
            })
    }

    async fn nack(self: Box<Self>) -> Result<(), BusError> {
        self.consumer
            .seek(
                self.message.topic(),
                self.message.partition(),
                Offset::Offset(self.message.offset()),
                SEEK_TIMEOUT,
            )
            .map_err(|e| BusError::Settle(format!("seek for redelivery: {}", e)))
    }
}
