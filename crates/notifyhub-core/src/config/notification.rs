//! Delivery, queueing and validation settings for the notification manager.

use serde::{Deserialize, Serialize};

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Maximum queued messages per user before the oldest is evicted.
    #[serde(default = "default_max_offline")]
    pub max_offline_messages: usize,
    /// Number of recent messages kept in the per-user in-memory history.
    #[serde(default = "default_max_history")]
    pub max_history_per_user: usize,
    /// Days after which stored notifications are removed.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Whether to write messages to the durable store.
    #[serde(default = "default_true")]
    pub persist_enabled: bool,
    /// Duplicate suppression window in milliseconds (`0` disables).
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,
    /// Maximum title length in characters.
    #[serde(default = "default_max_title")]
    pub max_title_length: usize,
    /// Maximum body length in characters.
    #[serde(default = "default_max_body")]
    pub max_body_length: usize,
    /// Maximum nesting depth of the structured payload.
    #[serde(default = "default_max_depth")]
    pub max_payload_depth: usize,
    /// Number of security events retained in the audit ring.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
    /// Whether attaching a session triggers a replay of queued messages.
    #[serde(default = "default_true")]
    pub replay_on_connect: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_offline_messages: default_max_offline(),
            max_history_per_user: default_max_history(),
            retention_days: default_retention_days(),
            persist_enabled: true,
            dedup_window_ms: default_dedup_window(),
            max_title_length: default_max_title(),
            max_body_length: default_max_body(),
            max_payload_depth: default_max_depth(),
            audit_capacity: default_audit_capacity(),
            replay_on_connect: true,
        }
    }
}

fn default_max_offline() -> usize {
    100
}

fn default_max_history() -> usize {
    50
}

fn default_retention_days() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

fn default_dedup_window() -> u64 {
    500
}

fn default_max_title() -> usize {
    200
}

fn default_max_body() -> usize {
    2000
}

fn default_max_depth() -> usize {
    3
}

fn default_audit_capacity() -> usize {
    1000
}
