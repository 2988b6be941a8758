//! Normalized event store

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use tracing::instrument;

use super::DbResult;
use crate::models::NormalizedLog;

#[async_trait]
pub trait NormalizedEventStore: Send + Sync {
    async fn insert(&self, log: &NormalizedLog) -> DbResult<()>;
}

#[derive(Clone)]
pub struct PgNormalizedEventStore {
    pool: PgPool,
}

impl PgNormalizedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NormalizedEventStore for PgNormalizedEventStore {
    #[instrument(skip(self, log), fields(event_id = %log.id, raw_log_id = %log.raw_log_id))]
    async fn insert(&self, log: &NormalizedLog) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO normalized_logs
                (id, raw_log_id, ocsf_event, event_time, severity_id, class_name,
                 created_at, indexed_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            "#,
        )
        .bind(log.id)
        .bind(log.raw_log_id)
        .bind(Json(&log.event))
        .bind(log.event.time)
        .bind(log.event.severity_id)
        .bind(&log.event.class_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
