pub mod response;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

use crate::bus::MessageBus;
use crate::config::Config;
use crate::error::{ApiResult, AppError};
use crate::{db, features, middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub bus: Arc<dyn MessageBus>,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        db: state.db.clone(),
        bus: Arc::clone(&state.bus),
    };

    Router::new()
        .route("/health", get(health_check))
        .with_state(state.db)
        .merge(features::router(feature_state))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check(State(pool): State<PgPool>) -> ApiResult<Json<Value>> {
    match db::health_check(&pool).await {
        Ok(()) => Ok(Json(json!({
            "status": "healthy",
            "database": "connected"
        }))),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            Err(AppError::Unavailable("database unreachable".to_string()))
        },
    }
}
