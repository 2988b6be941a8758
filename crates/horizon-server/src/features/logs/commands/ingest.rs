//! Ingest logs command
//!
//! Publishes each submitted log onto the bus subject the consumer reads.
//! Nothing is staged or normalized here; the response only says how many
//! logs made it onto the bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::MessageBus;

/// Command to publish a batch of raw logs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestLogsCommand {
    #[serde(default)]
    pub logs: Vec<Value>,

    /// Filled into object logs that do not name their own source type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestLogsResponse {
    pub ingested_count: usize,
    pub failed_count: usize,
}

impl IngestLogsCommand {
    /// Payload for one log, with the batch source type filled in
    fn payload(&self, mut log: Value) -> Result<Vec<u8>, serde_json::Error> {
        if let (Some(source_type), Value::Object(fields)) = (&self.source_type, &mut log) {
            if !fields.contains_key("source_type") {
                fields.insert("source_type".to_string(), Value::String(source_type.clone()));
            }
        }
        serde_json::to_vec(&log)
    }
}

/// Publish every log; a failed publish is counted, not fatal
#[tracing::instrument(
    skip(bus, command),
    fields(count = command.logs.len(), source_type = ?command.source_type)
)]
pub async fn handle(bus: &dyn MessageBus, mut command: IngestLogsCommand) -> IngestLogsResponse {
    let logs = std::mem::take(&mut command.logs);
    let mut response = IngestLogsResponse::default();

    for log in logs {
        let payload = match command.payload(log) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize log");
                response.failed_count += 1;
                continue;
            },
        };

        match bus.publish(payload).await {
            Ok(()) => response.ingested_count += 1,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to publish log");
                response.failed_count += 1;
            },
        }
    }

    tracing::info!(
        ingested = response.ingested_count,
        failed = response.failed_count,
        "Logs published"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_payload_fills_missing_source_type() {
        let command = IngestLogsCommand {
            logs: vec![],
            source_type: Some("firewall".to_string()),
        };

        let payload = command.payload(json!({"message": "x"})).unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["source_type"], "firewall");

        let payload = command
            .payload(json!({"message": "x", "source_type": "dns"}))
            .unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["source_type"], "dns");

        let payload = command.payload(json!("plain text")).unwrap();
        assert_eq!(payload, br#""plain text""#.to_vec());
    }

    #[tokio::test]
    async fn test_handle_publishes_each_log() {
        let bus = MemoryBus::new("logs.raw", 1);
        let command = IngestLogsCommand {
            logs: vec![json!({"a": 1}), json!({"b": 2})],
            source_type: None,
        };

        let response = handle(&bus, command).await;
        assert_eq!(response.ingested_count, 2);
        assert_eq!(response.failed_count, 0);

        let mut deliveries = bus.subscribe().await.unwrap();
        let first = deliveries.next().await.unwrap().unwrap();
        assert_eq!(first.payload(), br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_handle_empty_batch() {
        let bus = MemoryBus::new("logs.raw", 1);
        let response = handle(&bus, IngestLogsCommand::default()).await;
        assert_eq!(response, IngestLogsResponse::default());
        assert_eq!(bus.stats().published, 0);
    }
}
