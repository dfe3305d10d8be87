//! Health check handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let health = state.engine.health().await;
    let (status, store) = if health.store_healthy {
        ("ok", "connected")
    } else {
        ("degraded", "unavailable")
    };

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: status.to_string(),
        store: store.to_string(),
        sessions: health.sessions,
        connected_users: health.connected_users,
        queued: health.queued,
        pending_batches: health.pending_batches,
        optimization_level: state.engine.manager().optimizer().level().to_string(),
    }))
}
