//! Request DTOs.

use serde::Deserialize;

/// `?limit=` for history queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Requested limit clamped to `1..=max`, defaulting to `max`.
    pub fn resolve(&self, max: usize) -> usize {
        self.limit.unwrap_or(max).clamp(1, max.max(1))
    }
}

/// Query parameters for the WebSocket upgrade. The fronting gateway
/// establishes identity.
#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    pub user_id: String,
    /// `general` (default) or `admin`.
    pub namespace: Option<String>,
}
