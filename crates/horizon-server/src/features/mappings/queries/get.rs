use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::LogMapping;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMappingQuery {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetMappingError {
    #[error("Mapping '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[tracing::instrument(skip(pool), fields(id = %query.id))]
pub async fn handle(pool: PgPool, query: GetMappingQuery) -> Result<LogMapping, GetMappingError> {
    sqlx::query_as::<_, LogMapping>(
        r#"
        SELECT id, name, source_type, mapping_config, enabled, created_at, updated_at
        FROM log_mappings
        WHERE id = $1
        "#,
    )
    .bind(query.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(GetMappingError::NotFound(query.id))
}
