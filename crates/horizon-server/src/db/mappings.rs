//! Mapping catalog lookups used by the pipeline

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::DbResult;
use crate::models::LogMapping;

/// Read-only view of the mapping catalog
#[async_trait]
pub trait MappingCatalog: Send + Sync {
    /// The enabled mapping for `source_type`, oldest first when several exist
    async fn find_enabled(&self, source_type: &str) -> DbResult<Option<LogMapping>>;
}

#[derive(Clone)]
pub struct PgMappingCatalog {
    pool: PgPool,
}

impl PgMappingCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingCatalog for PgMappingCatalog {
    #[instrument(skip(self))]
    async fn find_enabled(&self, source_type: &str) -> DbResult<Option<LogMapping>> {
        let mapping = sqlx::query_as::<_, LogMapping>(
            r#"
            SELECT id, name, source_type, mapping_config, enabled, created_at, updated_at
            FROM log_mappings
            WHERE source_type = $1 AND enabled = TRUE
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(source_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }
}
