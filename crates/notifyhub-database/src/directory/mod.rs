//! Role lookup and recipient listing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::UserRole;

pub use memory::StaticUserDirectory;
pub use postgres::PgUserDirectory;

/// External identity store as seen by the notification engine.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Role of a user, `None` if the user is unknown.
    async fn get_role(&self, user_id: &UserId) -> AppResult<Option<UserRole>>;

    /// Active users holding `role`.
    async fn list_user_ids_by_role(&self, role: UserRole) -> AppResult<Vec<UserId>>;

    /// Every active user.
    async fn list_active_user_ids(&self) -> AppResult<Vec<UserId>>;
}
