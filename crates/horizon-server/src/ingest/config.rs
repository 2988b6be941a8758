//! Ingestion configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;
pub const DEFAULT_REPLAY_BATCH_SIZE: i64 = 500;

/// What to do with a message whose source type has no enabled mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingMappingPolicy {
    /// Leave the message unacknowledged so the bus delivers it again
    #[default]
    Redeliver,
    /// Acknowledge and leave the reference pending for a later replay
    Acknowledge,
}

impl FromStr for MissingMappingPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redeliver" | "nack" => Ok(Self::Redeliver),
            "acknowledge" | "ack" => Ok(Self::Acknowledge),
            other => anyhow::bail!(
                "Unknown INGEST_MISSING_MAPPING_POLICY '{}' (expected redeliver or acknowledge)",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Whether the bus consumer runs in this process
    pub enabled: bool,
    /// Upper bound on concurrently handled deliveries
    pub max_in_flight: usize,
    pub missing_mapping_policy: MissingMappingPolicy,
    /// Normalize pending references once before consuming
    pub replay_on_start: bool,
    pub replay_batch_size: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            missing_mapping_policy: MissingMappingPolicy::default(),
            replay_on_start: false,
            replay_batch_size: DEFAULT_REPLAY_BATCH_SIZE,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let missing_mapping_policy = match std::env::var("INGEST_MISSING_MAPPING_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => MissingMappingPolicy::default(),
        };

        let config = Self {
            enabled: std::env::var("INGEST_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            max_in_flight: std::env::var("INGEST_MAX_IN_FLIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_IN_FLIGHT),
            missing_mapping_policy,
            replay_on_start: std::env::var("INGEST_REPLAY_ON_START")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
            replay_batch_size: std::env::var("INGEST_REPLAY_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REPLAY_BATCH_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_in_flight == 0 {
            anyhow::bail!("INGEST_MAX_IN_FLIGHT must be greater than 0");
        }
        if self.replay_batch_size <= 0 {
            anyhow::bail!("INGEST_REPLAY_BATCH_SIZE must be greater than 0");
        }
        Ok(())
    }
}
