//! Aggregate statistics exposed to operational tooling.

use std::collections::HashMap;

use serde::Serialize;

use notifyhub_core::types::UserId;
use notifyhub_perf::PerformanceSnapshot;

use crate::metrics::MetricsSnapshot;
use crate::routing::DeliveryCounts;

/// Read-only snapshot of the whole notification pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationStats {
    pub metrics: MetricsSnapshot,
    pub offline_queued: usize,
    pub retry_queued: usize,
    /// Offline queue depth per user with a non-empty queue.
    pub queue_depths: HashMap<UserId, usize>,
    pub history_users: usize,
    pub history_entries: usize,
    pub delivery: DeliveryCounts,
    pub security_events: u64,
    pub replays_in_progress: usize,
    pub performance: PerformanceSnapshot,
}

impl NotificationStats {
    /// Fraction of accepted sends that reached a live session directly or
    /// through the cache.
    pub fn delivery_rate(&self) -> f64 {
        let sent = self.metrics.sent;
        if sent == 0 {
            return 0.0;
        }
        (self.metrics.delivered + self.metrics.cached) as f64 / sent as f64
    }

    /// Total messages waiting in queues.
    pub fn total_queued(&self) -> usize {
        self.offline_queued + self.retry_queued
    }
}
