//! PostgreSQL notification store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::{NotificationMessage, NotificationRecord};

use super::NotificationStore;

/// Notification rows in the `notifications` table.
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Create a store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, message: &NotificationMessage) -> AppResult<()> {
        let row = NotificationRecord::from(message);
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, body, priority, category, payload, variant, \
             created_at, expires_at, requires_action, action_url, action_text, delivered, delivered_at, read, read_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             ON CONFLICT (id) DO UPDATE SET \
             delivered = notifications.delivered OR EXCLUDED.delivered, \
             delivered_at = COALESCE(notifications.delivered_at, EXCLUDED.delivered_at), \
             read = notifications.read OR EXCLUDED.read, \
             read_at = COALESCE(notifications.read_at, EXCLUDED.read_at)",
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.kind)
        .bind(&row.title)
        .bind(&row.body)
        .bind(&row.priority)
        .bind(&row.category)
        .bind(&row.payload)
        .bind(&row.variant)
        .bind(row.created_at)
        .bind(row.expires_at)
        .bind(row.requires_action)
        .bind(&row.action_url)
        .bind(&row.action_text)
        .bind(row.delivered)
        .bind(row.delivered_at)
        .bind(row.read)
        .bind(row.read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert notification", e))?;
        Ok(())
    }

    async fn update_delivered_flag(&self, id: &NotificationId, delivered: bool) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET delivered = delivered OR $2, \
             delivered_at = CASE WHEN $2 AND delivered_at IS NULL THEN NOW() ELSE delivered_at END \
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(delivered)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update delivered flag", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_read_flag(&self, id: &NotificationId, read: bool) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read = read OR $2, \
             read_at = CASE WHEN $2 AND read_at IS NULL THEN NOW() ELSE read_at END \
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(read)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update read flag", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, id: &NotificationId) -> AppResult<Option<NotificationMessage>> {
        let row = sqlx::query_as::<_, NotificationRecord>("SELECT * FROM notifications WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find notification", e))?;
        row.map(NotificationMessage::try_from).transpose()
    }

    async fn query_history(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<NotificationMessage>> {
        let rows = sqlx::query_as::<_, NotificationRecord>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to query history", e))?;
        rows.into_iter().map(NotificationMessage::try_from).collect()
    }

    async fn count_unread(&self, user_id: &UserId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count unread", e))?;
        Ok(count.max(0) as u64)
    }

    async fn delete_expired_before(&self, ts: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(ts)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete expired", e))?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, ts: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE created_at < $1")
            .bind(ts)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete old notifications", e))?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> AppResult<bool> {
        crate::connection::schema_ready(&self.pool).await
    }
}
