//! Feature slices of the HTTP API
//!
//! Each feature is a vertical slice:
//! - `commands/` - write operations
//! - `queries/` - read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Handlers are standalone async functions taking their state and a command
//! or query value.
//!
//! - **logs**: publish raw logs onto the bus
//! - **mappings**: create and read the mappings that drive normalization

pub mod logs;
pub mod mappings;

use axum::Router;
use std::sync::Arc;

use crate::bus::MessageBus;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for mapping storage
    pub db: sqlx::PgPool,
    /// Bus the ingest endpoint publishes to
    pub bus: Arc<dyn MessageBus>,
}

/// Router with every feature mounted under its own prefix
///
/// - `/logs` - log ingestion
/// - `/mappings` - mapping management
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/logs", logs::logs_routes().with_state(state.bus))
        .nest("/mappings", mappings::mappings_routes().with_state(state.db))
}
