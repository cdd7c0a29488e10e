//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    database: String,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database, code) = match state.exchange.store.ping() {
        Ok(()) => ("healthy", "ok".to_string(), StatusCode::OK),
        Err(e) => {
            warn!("Health check failed: {}", e);
            ("degraded", e.to_string(), StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        database,
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
