//! Re-run normalization for references left pending

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{IngestError, IngestionPipeline};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl IngestionPipeline {
    /// Normalize up to `limit` unprocessed references, oldest first
    ///
    /// A failing reference is logged and counted; it stays pending and does
    /// not stop the batch.
    #[instrument(skip(self))]
    pub async fn replay_pending(&self, limit: i64) -> Result<ReplaySummary, IngestError> {
        let pending = self
            .ledger()
            .list_unprocessed(limit)
            .await
            .map_err(|source| IngestError::LedgerReadFailure { source })?;

        let mut summary = ReplaySummary::default();
        for reference in &pending {
            summary.attempted += 1;
            match self.processor().process(reference).await {
                Ok(_) => summary.succeeded += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        reference_id = %reference.id,
                        staging_key = %reference.staging_key,
                        source_type = %reference.source_type,
                        kind = err.kind(),
                        error = %err,
                        "Replay of pending reference failed"
                    );
                }
            }
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Replay of pending references finished"
        );

        Ok(summary)
    }
}
