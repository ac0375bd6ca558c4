//! Playhead API library
//!
//! This module exposes the core API components for use in integration tests
//! and by the server binary.

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::{AppState, HealthState};
pub use services::{ChatService, SessionStore};

/// Full application router without the transport layers
pub fn build_router(app_state: AppState, health_state: HealthState) -> Router {
    Router::new()
        .route("/", get(root))
        // Nested health routes: /health, /health/live, /health/ready
        .nest("/health", routes::health_router(health_state))
        .merge(routes::api_router(app_state))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Playhead Music Agent API v2.0",
        "status": "running",
    }))
}
