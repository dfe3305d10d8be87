//! Per-message delivery bookkeeping.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use notifyhub_core::types::NotificationId;
use notifyhub_entity::{DeliveryAttempt, DeliveryStatus};

/// Number of tracked messages per status.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeliveryCounts {
    pub pending: usize,
    pub delivered: usize,
    pub failed: usize,
    pub expired: usize,
}

/// Message id to latest delivery attempt.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    attempts: DashMap<NotificationId, DeliveryAttempt>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a message as pending if it is not tracked yet.
    pub fn begin(&self, id: &NotificationId) {
        self.attempts.entry(id.clone()).or_default();
    }

    /// Record an online attempt.
    pub fn record(&self, id: &NotificationId, delivered: bool) {
        self.attempts.entry(id.clone()).or_default().record(delivered);
    }

    /// Settle a message as expired unless it was already delivered.
    pub fn mark_expired(&self, id: &NotificationId) {
        let mut attempt = self.attempts.entry(id.clone()).or_default();
        if attempt.status != DeliveryStatus::Delivered {
            attempt.status = DeliveryStatus::Expired;
            attempt.last_attempt_at = Some(Utc::now());
        }
    }

    pub fn status(&self, id: &NotificationId) -> Option<DeliveryStatus> {
        self.attempts.get(id).map(|a| a.status)
    }

    pub fn attempt(&self, id: &NotificationId) -> Option<DeliveryAttempt> {
        self.attempts.get(id).map(|a| a.value().clone())
    }

    pub fn counts(&self) -> DeliveryCounts {
        let mut counts = DeliveryCounts::default();
        for entry in self.attempts.iter() {
            match entry.status {
                DeliveryStatus::Pending => counts.pending += 1,
                DeliveryStatus::Delivered => counts.delivered += 1,
                DeliveryStatus::Failed => counts.failed += 1,
                DeliveryStatus::Expired => counts.expired += 1,
            }
        }
        counts
    }

    /// Drop settled entries last touched before `cutoff`.
    pub fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.attempts.len();
        self.attempts.retain(|_, attempt| {
            !(attempt.status.is_settled() && attempt.last_attempt_at.is_some_and(|at| at < cutoff))
        });
        before - self.attempts.len()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
