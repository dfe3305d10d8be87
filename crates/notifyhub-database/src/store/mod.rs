//! Durable notification storage.
//!
//! The engine treats storage as best effort: a failed write is logged by
//! the caller and never blocks in-memory delivery or queuing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::NotificationMessage;

pub use memory::InMemoryNotificationStore;
pub use postgres::PgNotificationStore;

/// Persistence interface for notification rows.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug {
    /// Insert a message, replacing any row with the same id.
    async fn insert(&self, message: &NotificationMessage) -> AppResult<()>;

    /// Set the delivered flag. Flags never revert, so `false` on a
    /// delivered row is a no-op. Returns whether the row exists.
    async fn update_delivered_flag(&self, id: &NotificationId, delivered: bool) -> AppResult<bool>;

    /// Set the read flag with the same monotonic rule as delivery.
    async fn update_read_flag(&self, id: &NotificationId, read: bool) -> AppResult<bool>;

    /// Fetch one message by id.
    async fn find(&self, id: &NotificationId) -> AppResult<Option<NotificationMessage>>;

    /// Newest-first history for a user.
    async fn query_history(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<NotificationMessage>>;

    /// Number of unread messages for a user.
    async fn count_unread(&self, user_id: &UserId) -> AppResult<u64>;

    /// Delete rows whose expiry is at or before `ts`.
    async fn delete_expired_before(&self, ts: DateTime<Utc>) -> AppResult<u64>;

    /// Delete rows created before `ts`.
    async fn delete_older_than(&self, ts: DateTime<Utc>) -> AppResult<u64>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
