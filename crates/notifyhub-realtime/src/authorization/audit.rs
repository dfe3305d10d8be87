//! Security audit trail for authorization failures.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::NotificationCategory;

/// One recorded security-relevant event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    pub message_id: NotificationId,
    pub category: NotificationCategory,
    pub reason: String,
}

/// Bounded ring of recent security events.
#[derive(Debug)]
pub struct SecurityAuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    total: AtomicU64,
}

impl SecurityAuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            total: AtomicU64::new(0),
        }
    }

    /// Record a denied delivery.
    pub fn record(
        &self,
        user_id: &UserId,
        message_id: &NotificationId,
        category: NotificationCategory,
        reason: impl Into<String>,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            user_id: user_id.clone(),
            message_id: message_id.clone(),
            category,
            reason: reason.into(),
        };
        warn!(
            target: "notifyhub::security",
            user_id = %entry.user_id,
            message_id = %entry.message_id,
            category = %entry.category,
            reason = %entry.reason,
            "Notification authorization denied"
        );

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Events recorded since startup, including those rotated out.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
