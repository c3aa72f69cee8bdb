//! Health and metrics endpoints.

use axum::{extract::State, http::StatusCode, Json};
use session_store::SessionStore;
use telemetry::{metrics, MetricsSnapshot};
use tracing::warn;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Store reachability.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                store_connected: true,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    store_connected: false,
                }),
            )
        }
    }
}

/// GET /metrics - In-process enrichment counters.
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
