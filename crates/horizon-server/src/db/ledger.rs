//! Reference ledger: one row per staged raw message

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{DbError, DbResult};
use crate::models::RawLogReference;

/// Tracks which staged payloads exist and whether they were normalized
#[async_trait]
pub trait ReferenceLedger: Send + Sync {
    async fn insert(&self, reference: &RawLogReference) -> DbResult<()>;

    /// Flip a reference to processed
    ///
    /// Returns `false` when the row was already processed or does not exist.
    async fn mark_processed(&self, id: Uuid) -> DbResult<bool>;

    async fn get(&self, id: Uuid) -> DbResult<Option<RawLogReference>>;

    /// Oldest unprocessed references first
    async fn list_unprocessed(&self, limit: i64) -> DbResult<Vec<RawLogReference>>;
}

#[derive(Clone)]
pub struct PgReferenceLedger {
    pool: PgPool,
}

impl PgReferenceLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceLedger for PgReferenceLedger {
    #[instrument(skip(self, reference), fields(reference_id = %reference.id, staging_key = %reference.staging_key))]
    async fn insert(&self, reference: &RawLogReference) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO raw_log_references
                (id, source, source_type, staging_key, size_bytes, content_sha256,
                 received_at, processed, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reference.id)
        .bind(&reference.source)
        .bind(&reference.source_type)
        .bind(&reference.staging_key)
        .bind(reference.size_bytes)
        .bind(&reference.content_sha256)
        .bind(reference.received_at)
        .bind(reference.processed)
        .bind(reference.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DbError::duplicate("Raw log reference", &reference.staging_key)
            }
            other => DbError::Sqlx(other),
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_processed(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE raw_log_references
            SET processed = TRUE, processed_at = NOW()
            WHERE id = $1 AND processed = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> DbResult<Option<RawLogReference>> {
        let reference = sqlx::query_as::<_, RawLogReference>(
            r#"
            SELECT id, source, source_type, staging_key, size_bytes, content_sha256,
                   received_at, processed, processed_at
            FROM raw_log_references
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reference)
    }

    #[instrument(skip(self))]
    async fn list_unprocessed(&self, limit: i64) -> DbResult<Vec<RawLogReference>> {
        let references = sqlx::query_as::<_, RawLogReference>(
            r#"
            SELECT id, source, source_type, staging_key, size_bytes, content_sha256,
                   received_at, processed, processed_at
            FROM raw_log_references
            WHERE processed = FALSE
            ORDER BY received_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(references)
    }
}
