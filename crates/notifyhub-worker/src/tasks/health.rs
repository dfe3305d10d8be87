//! Periodic health check and statistics log.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use notifyhub_realtime::NotificationEngine;

use crate::executor::{TaskError, TaskHandler};

#[derive(Debug)]
pub struct EngineHealthTask {
    engine: Arc<NotificationEngine>,
}

impl EngineHealthTask {
    pub fn new(engine: Arc<NotificationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TaskHandler for EngineHealthTask {
    fn task_name(&self) -> &str {
        super::ENGINE_HEALTH
    }

    async fn execute(&self) -> Result<Value, TaskError> {
        let health = self.engine.health().await;
        let stats = self.engine.manager().stats();
        tracing::info!(
            sessions = health.sessions,
            connected_users = health.connected_users,
            queued = health.queued,
            pending_batches = health.pending_batches,
            sent = stats.metrics.sent,
            delivered = stats.metrics.delivered,
            delivery_rate = stats.delivery_rate(),
            security_events = stats.security_events,
            "Notification engine status"
        );
        if !health.store_healthy {
            return Err(TaskError::Failed("notification store is unhealthy".to_string()));
        }
        Ok(serde_json::json!({
            "task": super::ENGINE_HEALTH,
            "health": health,
        }))
    }
}
