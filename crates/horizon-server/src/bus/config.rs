use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Default subject carrying raw log payloads
pub const DEFAULT_BUS_SUBJECT: &str = "logs.raw";

/// Default number of deliveries before the in-memory bus drops a message
pub const DEFAULT_BUS_MAX_DELIVER: u32 = 5;

pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
pub const DEFAULT_KAFKA_GROUP_ID: &str = "horizon-ingest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusTransport {
    #[default]
    Memory,
    Kafka,
}

impl FromStr for BusTransport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "kafka" => Ok(Self::Kafka),
            other => anyhow::bail!("Unknown BUS_TRANSPORT '{}' (expected memory or kafka)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub transport: BusTransport,
    pub subject: String,
    /// In-memory transport only; Kafka redelivers until committed
    pub max_deliver: u32,
    pub kafka_brokers: String,
    pub kafka_group_id: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: BusTransport::default(),
            subject: DEFAULT_BUS_SUBJECT.to_string(),
            max_deliver: DEFAULT_BUS_MAX_DELIVER,
            kafka_brokers: DEFAULT_KAFKA_BROKERS.to_string(),
            kafka_group_id: DEFAULT_KAFKA_GROUP_ID.to_string(),
        }
    }
}

impl BusConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let transport = match env::var("BUS_TRANSPORT") {
            Ok(value) => value.parse()?,
            Err(_) => BusTransport::default(),
        };

        let config = Self {
            transport,
            subject: env::var("BUS_SUBJECT").unwrap_or_else(|_| DEFAULT_BUS_SUBJECT.to_string()),
            max_deliver: env::var("BUS_MAX_DELIVER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BUS_MAX_DELIVER),
            kafka_brokers: env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| DEFAULT_KAFKA_BROKERS.to_string()),
            kafka_group_id: env::var("KAFKA_GROUP_ID")
                .unwrap_or_else(|_| DEFAULT_KAFKA_GROUP_ID.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.subject.trim().is_empty() {
            anyhow::bail!("BUS_SUBJECT cannot be empty");
        }
        if self.max_deliver == 0 {
            anyhow::bail!("BUS_MAX_DELIVER must be greater than 0");
        }
        if self.transport == BusTransport::Kafka {
            if self.kafka_brokers.trim().is_empty() {
                anyhow::bail!("KAFKA_BROKERS cannot be empty");
            }
            if self.kafka_group_id.trim().is_empty() {
                anyhow::bail!("KAFKA_GROUP_ID cannot be empty");
            }
        }
        Ok(())
    }
}
