//! Fixed in-process directory.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::UserRole;

use super::UserDirectory;

#[derive(Debug, Clone, Copy)]
struct Entry {
    role: UserRole,
    active: bool,
}

/// Directory populated at startup or by tests.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: RwLock<BTreeMap<UserId, Entry>>,
}

impl StaticUserDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_user(self, user_id: impl Into<UserId>, role: UserRole) -> Self {
        self.insert(user_id, role);
        self
    }

    /// Add or replace an active user.
    pub fn insert(&self, user_id: impl Into<UserId>, role: UserRole) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.into(), Entry { role, active: true });
    }

    /// Mark a user inactive; inactive users keep their role but are not listed.
    pub fn deactivate(&self, user_id: &UserId) {
        if let Some(entry) = self
            .users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(user_id)
        {
            entry.active = false;
        }
    }

    fn list(&self, pred: impl Fn(&Entry) -> bool) -> Vec<UserId> {
        self.users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, entry)| entry.active && pred(entry))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn get_role(&self, user_id: &UserId) -> AppResult<Option<UserRole>> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .map(|entry| entry.role))
    }

    async fn list_user_ids_by_role(&self, role: UserRole) -> AppResult<Vec<UserId>> {
        Ok(self.list(|entry| entry.role == role))
    }

    async fn list_active_user_ids(&self) -> AppResult<Vec<UserId>> {
        Ok(self.list(|_| true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_only_active_users() {
        let directory = StaticUserDirectory::new()
            .with_user("root", UserRole::Admin)
            .with_user("amy", UserRole::Viewer)
            .with_user("zed", UserRole::Admin);
        directory.deactivate(&UserId::new("zed"));

        let admins = directory.list_user_ids_by_role(UserRole::Admin).await.unwrap();
        assert_eq!(admins, vec![UserId::new("root")]);
        assert_eq!(directory.list_active_user_ids().await.unwrap().len(), 2);
        assert_eq!(
            directory.get_role(&UserId::new("zed")).await.unwrap(),
            Some(UserRole::Admin)
        );
        assert_eq!(directory.get_role(&UserId::new("nobody")).await.unwrap(), None);
    }
}
