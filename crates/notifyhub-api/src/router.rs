//! Route definitions for the NotifyHub HTTP API.
//!
//! REST routes are mounted under `/api`; the WebSocket endpoint lives at
//! `/ws`.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::build_cors_layer;
use crate::state::AppState;

/// Build the complete Axum router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(notification_routes());

    let ws_routes = Router::new().route("/ws", get(handlers::ws::ws_handler));

    let cors = build_cors_layer(&state.config.server);

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/stats", get(handlers::notification::stats))
        .route(
            "/notifications/{user_id}/history",
            get(handlers::notification::history),
        )
        .route(
            "/notifications/{user_id}/{notification_id}/read",
            post(handlers::notification::mark_read),
        )
        .route(
            "/notifications/{user_id}/replay",
            post(handlers::notification::replay),
        )
}
