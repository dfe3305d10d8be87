//! Directory backed by the `users` table.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::UserRole;

use super::UserDirectory;

/// Reads roles from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a directory on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_role(&self, user_id: &UserId) -> AppResult<Option<UserRole>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up role", e))?;

        Ok(role.and_then(|r| match r.parse::<UserRole>() {
            Ok(role) => Some(role),
            Err(_) => {
                warn!(user_id = %user_id, role = %r, "Unrecognized role in users table");
                None
            }
        }))
    }

    async fn list_user_ids_by_role(&self, role: UserRole) -> AppResult<Vec<UserId>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE role = $1 AND is_active ORDER BY id")
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to list users by role", e)
                })?;
        Ok(ids.into_iter().map(UserId::new).collect())
    }

    async fn list_active_user_ids(&self) -> AppResult<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE is_active ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list active users", e))?;
        Ok(ids.into_iter().map(UserId::new).collect())
    }
}
