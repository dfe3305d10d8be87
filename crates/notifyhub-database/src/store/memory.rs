//! In-process notification store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notifyhub_core::error::AppError;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::NotificationMessage;

use super::NotificationStore;

#[derive(Debug)]
struct StoredRow {
    seq: u64,
    message: NotificationMessage,
}

/// Store backed by a map, for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    rows: RwLock<HashMap<NotificationId, StoredRow>>,
    next_seq: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a database error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("Notification store is unavailable"));
        }
        Ok(())
    }

    fn delete_where(&self, pred: impl Fn(&NotificationMessage) -> bool) -> u64 {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let before = rows.len();
        rows.retain(|_, row| !pred(&row.message));
        (before - rows.len()) as u64
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, message: &NotificationMessage) -> AppResult<()> {
        self.check_available()?;
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        match rows.get_mut(&message.id) {
            Some(existing) => {
                let mut merged = message.clone();
                if existing.message.is_delivered() {
                    merged.mark_delivered();
                }
                if existing.message.is_read() {
                    merged.mark_read();
                }
                existing.message = merged;
            }
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                rows.insert(
                    message.id.clone(),
                    StoredRow {
                        seq,
                        message: message.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn update_delivered_flag(&self, id: &NotificationId, delivered: bool) -> AppResult<bool> {
        self.check_available()?;
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        match rows.get_mut(id) {
            Some(row) => {
                if delivered {
                    row.message.mark_delivered();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_read_flag(&self, id: &NotificationId, read: bool) -> AppResult<bool> {
        self.check_available()?;
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        match rows.get_mut(id) {
            Some(row) => {
                if read {
                    row.message.mark_read();
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, id: &NotificationId) -> AppResult<Option<NotificationMessage>> {
        self.check_available()?;
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(id).map(|row| row.message.clone()))
    }

    async fn query_history(&self, user_id: &UserId, limit: usize) -> AppResult<Vec<NotificationMessage>> {
        self.check_available()?;
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<&StoredRow> = rows
            .values()
            .filter(|row| row.message.user_id.as_ref() == Some(user_id))
            .collect();
        matching.sort_by(|a, b| {
            b.message
                .created_at
                .cmp(&a.message.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|row| row.message.clone())
            .collect())
    }

    async fn count_unread(&self, user_id: &UserId) -> AppResult<u64> {
        self.check_available()?;
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .values()
            .filter(|row| row.message.user_id.as_ref() == Some(user_id) && !row.message.is_read())
            .count() as u64)
    }

    async fn delete_expired_before(&self, ts: DateTime<Utc>) -> AppResult<u64> {
        self.check_available()?;
        Ok(self.delete_where(|msg| msg.is_expired_at(ts)))
    }

    async fn delete_older_than(&self, ts: DateTime<Utc>) -> AppResult<u64> {
        self.check_available()?;
        Ok(self.delete_where(|msg| msg.created_at < ts))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use notifyhub_entity::{NotificationCategory, NotificationKind};

    use super::*;

    fn message(user: &str, title: &str) -> NotificationMessage {
        NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, title, "body")
            .for_user(user)
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let store = InMemoryNotificationStore::new();
        for title in ["first", "second", "third"] {
            store.insert(&message("alice", title)).await.unwrap();
        }
        store.insert(&message("bob", "other")).await.unwrap();

        let history = store.query_history(&UserId::new("alice"), 2).await.unwrap();
        let titles: Vec<&str> = history.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn test_flags_never_revert() {
        let store = InMemoryNotificationStore::new();
        let msg = message("alice", "hello");
        store.insert(&msg).await.unwrap();

        assert!(store.update_read_flag(&msg.id, true).await.unwrap());
        assert!(store.update_read_flag(&msg.id, false).await.unwrap());
        // Re-inserting the unread original keeps the stored read flag.
        store.insert(&msg).await.unwrap();

        let stored = store.find(&msg.id).await.unwrap().unwrap();
        assert!(stored.is_read());
        assert!(!stored.is_delivered());
        assert!(!store.update_read_flag(&NotificationId::new("missing"), true).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_by_expiry_and_age() {
        let store = InMemoryNotificationStore::new();
        let expiring = message("alice", "soon").expires_in(Duration::minutes(5));
        let mut old = message("alice", "old");
        old.created_at = Utc::now() - Duration::days(40);
        store.insert(&expiring).await.unwrap();
        store.insert(&old).await.unwrap();
        store.insert(&message("alice", "fresh")).await.unwrap();

        let removed = store
            .delete_expired_before(Utc::now() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let removed = store
            .delete_older_than(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryNotificationStore::new();
        store.set_unavailable(true);
        assert!(store.insert(&message("alice", "x")).await.is_err());
        assert!(!store.health_check().await.unwrap());
    }
}
