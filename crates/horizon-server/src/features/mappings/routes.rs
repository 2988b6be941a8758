//! Mapping API routes
//!
//! - `POST /mappings` - Create a mapping
//! - `GET /mappings` - List mappings, newest first
//! - `GET /mappings/:id` - Get a single mapping

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    commands::{CreateMappingCommand, CreateMappingError},
    queries::{GetMappingError, GetMappingQuery, ListMappingsError, ListMappingsQuery},
};
use crate::api::response::{ApiResponse, ErrorResponse};

pub fn mappings_routes() -> Router<PgPool> {
    Router::new()
        .route("/", get(list_mappings).post(create_mapping))
        .route("/:id", get(get_mapping))
}

/// Create a new mapping
///
/// - `201 Created` - Mapping created
/// - `400 Bad Request` - Blank name or source type, non-object config
/// - `409 Conflict` - Name already used for the source type
#[tracing::instrument(
    skip(pool, command),
    fields(name = %command.name, source_type = %command.source_type)
)]
async fn create_mapping(
    State(pool): State<PgPool>,
    Json(command): Json<CreateMappingCommand>,
) -> Result<Response, MappingApiError> {
    let mapping = super::commands::create::handle(pool, command).await?;

    tracing::info!(mapping_id = %mapping.id, "Mapping created via API");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(mapping))).into_response())
}

#[tracing::instrument(skip(pool), fields(id = %id))]
async fn get_mapping(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, MappingApiError> {
    let mapping = super::queries::get::handle(pool, GetMappingQuery { id }).await?;
    Ok(ApiResponse::success(mapping).into_response())
}

#[tracing::instrument(skip(pool, query), fields(source_type = ?query.source_type))]
async fn list_mappings(
    State(pool): State<PgPool>,
    Query(query): Query<ListMappingsQuery>,
) -> Result<Response, MappingApiError> {
    let mappings = super::queries::list::handle(pool, query).await?;

    tracing::debug!(count = mappings.len(), "Mappings listed via API");

    let meta = json!({ "count": mappings.len() });
    Ok(ApiResponse::success_with_meta(mappings, meta).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum MappingApiError {
    #[error(transparent)]
    Create(#[from] CreateMappingError),
    #[error(transparent)]
    Get(#[from] GetMappingError),
    #[error(transparent)]
    List(#[from] ListMappingsError),
}

impl IntoResponse for MappingApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            MappingApiError::Create(CreateMappingError::Duplicate { .. }) => {
                (StatusCode::CONFLICT, "CONFLICT")
            },
            MappingApiError::Create(CreateMappingError::Database(_))
            | MappingApiError::Get(GetMappingError::Database(_))
            | MappingApiError::List(ListMappingsError::Database(_)) => {
                tracing::error!("Database error in mapping API: {}", self);
                return ErrorResponse::new("INTERNAL_ERROR", "A database error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR);
            },
            MappingApiError::Create(_) | MappingApiError::List(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            },
            MappingApiError::Get(GetMappingError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            },
        };

        ErrorResponse::new(code, self.to_string()).into_response_with(status)
    }
}
