//! Limiter, dedup, tracker and session pruning.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use notifyhub_realtime::NotificationEngine;

use crate::executor::{TaskError, TaskHandler};

/// Drops idle limiter windows, stale dedup keys, settled tracker entries,
/// expired cache entries and dead sessions.
#[derive(Debug)]
pub struct LimiterPruneTask {
    engine: Arc<NotificationEngine>,
}

impl LimiterPruneTask {
    pub fn new(engine: Arc<NotificationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TaskHandler for LimiterPruneTask {
    fn task_name(&self) -> &str {
        super::LIMITER_PRUNE
    }

    async fn execute(&self) -> Result<Value, TaskError> {
        let report = self.engine.manager().prune();
        let dead_sessions = self.engine.sessions().map_or(0, |registry| registry.prune_dead());
        tracing::debug!(
            performance = report.performance,
            dedup_keys = report.dedup_keys,
            tracker_entries = report.tracker_entries,
            dead_sessions,
            "Pruned engine state"
        );
        Ok(serde_json::json!({
            "task": super::LIMITER_PRUNE,
            "report": report,
            "dead_sessions": dead_sessions,
        }))
    }
}
