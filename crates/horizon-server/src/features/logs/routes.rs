//! Log ingestion routes
//!
//! - `POST /logs/ingest` - Publish raw logs onto the bus

use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

use super::commands::{IngestLogsCommand, IngestLogsResponse};
use crate::api::response::ApiResponse;
use crate::bus::MessageBus;

pub fn logs_routes() -> Router<Arc<dyn MessageBus>> {
    Router::new().route("/ingest", post(ingest_logs))
}

#[tracing::instrument(skip(bus, command), fields(count = command.logs.len()))]
async fn ingest_logs(
    State(bus): State<Arc<dyn MessageBus>>,
    Json(command): Json<IngestLogsCommand>,
) -> ApiResponse<IngestLogsResponse> {
    let response = super::commands::ingest::handle(bus.as_ref(), command).await;
    ApiResponse::success(response)
}
