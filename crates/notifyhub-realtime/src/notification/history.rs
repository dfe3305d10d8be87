//! Short per-user in-memory history of recent notifications.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::NotificationMessage;

/// Newest-first history bounded per user.
#[derive(Debug)]
pub struct NotificationHistory {
    entries: DashMap<UserId, VecDeque<NotificationMessage>>,
    capacity: usize,
}

impl NotificationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a message as the newest entry, replacing an older copy with
    /// the same id. Delivered and read flags of the older copy carry over.
    pub fn record(&self, user_id: &UserId, mut message: NotificationMessage) {
        let mut list = self.entries.entry(user_id.clone()).or_default();
        if let Some(pos) = list.iter().position(|m| m.id == message.id) {
            if let Some(older) = list.remove(pos) {
                if older.is_delivered() {
                    message.mark_delivered();
                }
                if older.is_read() {
                    message.mark_read();
                }
            }
        }
        list.push_front(message);
        list.truncate(self.capacity);
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, user_id: &UserId, limit: usize) -> Vec<NotificationMessage> {
        self.entries
            .get(user_id)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, user_id: &UserId, id: &NotificationId) -> Option<NotificationMessage> {
        self.entries
            .get(user_id)
            .and_then(|list| list.iter().find(|m| &m.id == id).cloned())
    }

    /// Set the read flag. `None` when the message is not in the history.
    pub fn mark_read(&self, user_id: &UserId, id: &NotificationId) -> Option<bool> {
        let mut list = self.entries.get_mut(user_id)?;
        list.iter_mut().find(|m| &m.id == id).map(|m| m.mark_read())
    }

    /// Set the delivered flag. `None` when the message is not in the history.
    pub fn mark_delivered(&self, user_id: &UserId, id: &NotificationId) -> Option<bool> {
        let mut list = self.entries.get_mut(user_id)?;
        list.iter_mut().find(|m| &m.id == id).map(|m| m.mark_delivered())
    }

    pub fn unread_count(&self, user_id: &UserId) -> u64 {
        self.entries
            .get(user_id)
            .map_or(0, |list| list.iter().filter(|m| !m.is_read()).count() as u64)
    }

    /// Drop entries expired at `now`.
    pub fn remove_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for mut entry in self.entries.iter_mut() {
            let list = entry.value_mut();
            let before = list.len();
            list.retain(|m| !m.is_expired_at(now));
            removed += before - list.len();
        }
        self.entries.retain(|_, list| !list.is_empty());
        removed
    }

    pub fn user_count(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|list| list.len()).sum()
    }
}
