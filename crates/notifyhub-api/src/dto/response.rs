//! Response DTOs.

use serde::{Deserialize, Serialize};

use notifyhub_entity::NotificationMessage;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Component-level health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// `connected` or `unavailable`.
    pub store: String,
    pub sessions: usize,
    pub connected_users: usize,
    pub queued: usize,
    pub pending_batches: usize,
    pub optimization_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub unread: u64,
    pub notifications: Vec<NotificationMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResponse {
    pub replayed: usize,
    pub remaining: usize,
}
