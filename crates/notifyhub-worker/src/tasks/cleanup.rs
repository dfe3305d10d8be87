//! Expired and retention cleanup.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use notifyhub_realtime::NotificationManager;

use crate::executor::{TaskError, TaskHandler};

/// Drops expired messages from queues, history and the store, and store
/// rows past the retention window.
#[derive(Debug)]
pub struct NotificationCleanupTask {
    manager: Arc<NotificationManager>,
}

impl NotificationCleanupTask {
    pub fn new(manager: Arc<NotificationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl TaskHandler for NotificationCleanupTask {
    fn task_name(&self) -> &str {
        super::NOTIFICATION_CLEANUP
    }

    async fn execute(&self) -> Result<Value, TaskError> {
        let report = self.manager.cleanup_expired().await;
        if report.total() > 0 {
            tracing::info!(
                queued = report.queued_expired,
                history = report.history_expired,
                stored_expired = report.stored_expired,
                stored_retention = report.stored_retention,
                "Notification cleanup removed entries"
            );
        }
        Ok(serde_json::json!({
            "task": super::NOTIFICATION_CLEANUP,
            "report": report,
        }))
    }
}
