//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use notifyhub_core::config::AppConfig;
use notifyhub_realtime::NotificationEngine;

/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<NotificationEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<NotificationEngine>) -> Self {
        Self {
            config: Arc::new(engine.config().clone()),
            engine,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
