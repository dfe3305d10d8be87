//! Notification manager counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Aggregate counters updated by the manager and router.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub sent: AtomicU64,
    pub delivered: AtomicU64,
    pub cached: AtomicU64,
    pub batched: AtomicU64,
    pub queued: AtomicU64,
    pub deflected: AtomicU64,
    pub failed: AtomicU64,
    pub replayed: AtomicU64,
    pub rejected_validation: AtomicU64,
    pub rejected_authorization: AtomicU64,
    pub rejected_rate_limit: AtomicU64,
    pub rejected_expired: AtomicU64,
    pub duplicates: AtomicU64,
    pub queue_evictions: AtomicU64,
    pub persisted: AtomicU64,
    pub persist_failures: AtomicU64,
    pub fanouts: AtomicU64,
    pub expired_cleaned: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            sent: load(&self.sent),
            delivered: load(&self.delivered),
            cached: load(&self.cached),
            batched: load(&self.batched),
            queued: load(&self.queued),
            deflected: load(&self.deflected),
            failed: load(&self.failed),
            replayed: load(&self.replayed),
            rejected_validation: load(&self.rejected_validation),
            rejected_authorization: load(&self.rejected_authorization),
            rejected_rate_limit: load(&self.rejected_rate_limit),
            rejected_expired: load(&self.rejected_expired),
            duplicates: load(&self.duplicates),
            queue_evictions: load(&self.queue_evictions),
            persisted: load(&self.persisted),
            persist_failures: load(&self.persist_failures),
            fanouts: load(&self.fanouts),
            expired_cleaned: load(&self.expired_cleaned),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Messages accepted by `send`, including fan-out copies.
    pub sent: u64,
    /// Messages accepted by a live session.
    pub delivered: u64,
    /// Sends short-circuited by the message cache.
    pub cached: u64,
    /// Messages handed to the batcher.
    pub batched: u64,
    /// Messages placed on an offline queue.
    pub queued: u64,
    /// Messages deflected to offline queuing by backpressure.
    pub deflected: u64,
    /// Online attempts that failed.
    pub failed: u64,
    /// Messages delivered by replay.
    pub replayed: u64,
    pub rejected_validation: u64,
    pub rejected_authorization: u64,
    pub rejected_rate_limit: u64,
    pub rejected_expired: u64,
    pub duplicates: u64,
    /// Oldest entries dropped from full queues.
    pub queue_evictions: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    pub fanouts: u64,
    pub expired_cleaned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = EngineMetrics::new();
        EngineMetrics::inc(&metrics.sent);
        EngineMetrics::add(&metrics.queued, 3);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sent, 1);
        assert_eq!(snapshot.queued, 3);
        assert_eq!(snapshot.delivered, 0);
    }
}
