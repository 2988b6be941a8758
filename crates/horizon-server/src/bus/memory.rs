//! In-process bus backed by a tokio channel

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{BusError, Delivery, DeliveryStream, MessageBus};

struct Envelope {
    payload: Vec<u8>,
    attempt: u32,
}

type Receiver = mpsc::UnboundedReceiver<Envelope>;

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    acked: AtomicU64,
    redelivered: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of [`MemoryBus`] activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    pub delivered: u64,
    pub acked: u64,
    /// Nacked deliveries put back on the channel
    pub redelivered: u64,
    /// Nacked deliveries discarded after reaching the delivery limit
    pub dropped: u64,
}

/// Single-subject bus living inside the process
///
/// Messages published before anyone subscribes are buffered. Only one
/// subscription may be active at a time; dropping its stream hands the
/// buffered messages back to the bus for the next subscriber.
pub struct MemoryBus {
    subject: Arc<str>,
    max_deliver: u32,
    sender: mpsc::UnboundedSender<Envelope>,
    receiver: Arc<Mutex<Option<Receiver>>>,
    counters: Arc<Counters>,
}

impl MemoryBus {
    pub fn new(subject: &str, max_deliver: u32) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            subject: Arc::from(subject),
            max_deliver: max_deliver.max(1),
            sender,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            acked: self.counters.acked.load(Ordering::Relaxed),
            redelivered: self.counters.redelivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<(), BusError> {
        self.sender
            .send(Envelope {
                payload,
                attempt: 1,
            })
            .map_err(|_| BusError::Publish {
                subject: self.subject.to_string(),
                message: "channel closed".to_string(),
            })?;
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self) -> Result<DeliveryStream, BusError> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| BusError::Subscribe {
                subject: self.subject.to_string(),
                message: "subscription state poisoned".to_string(),
            })?
            .take()
            .ok_or_else(|| BusError::AlreadySubscribed(self.subject.to_string()))?;

        debug!(subject = %self.subject, "Subscribed to in-memory bus");

        let subscription = Subscription {
            receiver: Some(receiver),
            slot: Arc::clone(&self.receiver),
            subject: Arc::clone(&self.subject),
            sender: self.sender.clone(),
            max_deliver: self.max_deliver,
            counters: Arc::clone(&self.counters),
        };

        let deliveries = stream::unfold(subscription, |mut sub| async move {
            let envelope = sub.receiver.as_mut()?.recv().await?;
            sub.counters.delivered.fetch_add(1, Ordering::Relaxed);
            let delivery: Box<dyn Delivery> = Box::new(MemoryDelivery {
                envelope,
                subject: Arc::clone(&sub.subject),
                sender: sub.sender.clone(),
                max_deliver: sub.max_deliver,
                counters: Arc::clone(&sub.counters),
            });
            Some((Ok(delivery), sub))
        });

        Ok(Box::pin(deliveries))
    }
}

struct Subscription {
    receiver: Option<Receiver>,
    slot: Arc<Mutex<Option<Receiver>>>,
    subject: Arc<str>,
    sender: mpsc::UnboundedSender<Envelope>,
    max_deliver: u32,
    counters: Arc<Counters>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(receiver), Ok(mut slot)) = (self.receiver.take(), self.slot.lock()) {
            *slot = Some(receiver);
        }
    }
}

struct MemoryDelivery {
    envelope: Envelope,
    subject: Arc<str>,
    sender: mpsc::UnboundedSender<Envelope>,
    max_deliver: u32,
    counters: Arc<Counters>,
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.envelope.payload
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn attempt(&self) -> u32 {
        self.envelope.attempt
    }

    async fn ack(self: Box<Self>) -> Result<(), BusError> {
        self.counters.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<(), BusError> {
        let attempt = self.envelope.attempt;
        if attempt >= self.max_deliver {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                subject = %self.subject,
                attempt,
                max_deliver = self.max_deliver,
                "Delivery limit reached, dropping message"
            );
            return Ok(());
        }

        let MemoryDelivery {
            envelope,
            sender,
            counters,
            ..
        } = *self;
        sender
            .send(Envelope {
                payload: envelope.payload,
                attempt: attempt + 1,
            })
            .map_err(|_| BusError::Settle("in-memory channel closed".to_string()))?;
        counters.redelivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
