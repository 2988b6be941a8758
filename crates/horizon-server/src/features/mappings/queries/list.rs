use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::LogMapping;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMappingsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListMappingsError {
    #[error("Limit must be between 1 and 500")]
    InvalidLimit,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ListMappingsQuery {
    pub fn validate(&self) -> Result<(), ListMappingsError> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_LIST_LIMIT).contains(&limit) {
                return Err(ListMappingsError::InvalidLimit);
            }
        }
        Ok(())
    }
}

/// Mappings newest first, optionally narrowed to one source type
#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    query: ListMappingsQuery,
) -> Result<Vec<LogMapping>, ListMappingsError> {
    query.validate()?;

    let mappings = sqlx::query_as::<_, LogMapping>(
        r#"
        SELECT id, name, source_type, mapping_config, enabled, created_at, updated_at
        FROM log_mappings
        WHERE ($1::TEXT IS NULL OR source_type = $1)
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(query.source_type.as_deref())
    .bind(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
    .fetch_all(&pool)
    .await?;

    Ok(mappings)
}
