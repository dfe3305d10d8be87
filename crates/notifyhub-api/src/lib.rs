//! # notifyhub-api
//!
//! HTTP API layer for NotifyHub built on Axum.
//!
//! Provides the health and statistics endpoints, per-user history, read
//! and replay operations, and the WebSocket endpoint that attaches live
//! sessions to the notification engine.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
