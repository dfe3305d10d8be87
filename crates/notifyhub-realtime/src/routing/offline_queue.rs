//! Bounded per-user FIFO queues.
//!
//! Used both for the offline queue (no live session) and the retry queue
//! (members of failed batch flushes). Each user's queue is guarded by its
//! map shard; no lock is held across an await.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use notifyhub_core::types::UserId;
use notifyhub_entity::NotificationMessage;

/// Result of appending to a queue.
#[derive(Debug)]
pub struct PushOutcome {
    /// Depth after the push.
    pub depth: usize,
    /// The oldest entry, when it was evicted to make room.
    pub evicted: Option<NotificationMessage>,
}

/// Bounded FIFO queue per user; the oldest entry is evicted on overflow.
#[derive(Debug)]
pub struct MessageQueues {
    queues: DashMap<UserId, VecDeque<NotificationMessage>>,
    capacity: usize,
}

impl MessageQueues {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, evicting the oldest when the queue is full.
    pub fn push_back(&self, user_id: &UserId, message: NotificationMessage) -> PushOutcome {
        let mut queue = self.queues.entry(user_id.clone()).or_default();
        let evicted = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(message);
        PushOutcome {
            depth: queue.len(),
            evicted,
        }
    }

    /// Put a message back at the head. Returns `false` and drops the
    /// message when the queue filled up in the meantime, since the head
    /// is the entry overflow would evict.
    pub fn push_front(&self, user_id: &UserId, message: NotificationMessage) -> bool {
        let mut queue = self.queues.entry(user_id.clone()).or_default();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_front(message);
        true
    }

    /// Take the oldest message.
    pub fn pop_front(&self, user_id: &UserId) -> Option<NotificationMessage> {
        let message = {
            let mut queue = self.queues.get_mut(user_id)?;
            queue.pop_front()
        };
        self.queues.remove_if(user_id, |_, q| q.is_empty());
        message
    }

    /// Copy of a user's queue in FIFO order.
    pub fn peek_all(&self, user_id: &UserId) -> Vec<NotificationMessage> {
        self.queues
            .get(user_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn depth(&self, user_id: &UserId) -> usize {
        self.queues.get(user_id).map_or(0, |q| q.len())
    }

    pub fn total(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Depth of every non-empty queue.
    pub fn depths(&self) -> HashMap<UserId, usize> {
        self.queues
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }

    /// Drop entries whose expiry is at or before `now`. Returns the
    /// removed messages.
    pub fn remove_expired(&self, now: DateTime<Utc>) -> Vec<NotificationMessage> {
        let mut removed = Vec::new();
        for mut entry in self.queues.iter_mut() {
            let queue = entry.value_mut();
            let mut kept = VecDeque::with_capacity(queue.len());
            for message in queue.drain(..) {
                if message.is_expired_at(now) {
                    removed.push(message);
                } else {
                    kept.push_back(message);
                }
            }
            *queue = kept;
        }
        self.queues.retain(|_, q| !q.is_empty());
        removed
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use notifyhub_entity::{NotificationCategory, NotificationKind};

    use super::*;

    fn msg(id: &str) -> NotificationMessage {
        NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, id, "body").with_id(id)
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let queues = MessageQueues::new(5);
        let user = UserId::new("u1");
        let mut evicted = Vec::new();
        for i in 0..7 {
            if let Some(old) = queues.push_back(&user, msg(&format!("m{i}"))).evicted {
                evicted.push(old.id.into_inner());
            }
        }
        assert_eq!(queues.depth(&user), 5);
        assert_eq!(evicted, vec!["m0", "m1"]);
        let ids: Vec<_> = queues.peek_all(&user).into_iter().map(|m| m.id.into_inner()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4", "m5", "m6"]);
    }

    #[test]
    fn test_push_front_preserves_order() {
        let queues = MessageQueues::new(3);
        let user = UserId::new("u1");
        queues.push_back(&user, msg("a"));
        queues.push_back(&user, msg("b"));
        let head = queues.pop_front(&user).unwrap();
        assert!(queues.push_front(&user, head));
        assert_eq!(queues.pop_front(&user).unwrap().id.as_str(), "a");
        assert_eq!(queues.pop_front(&user).unwrap().id.as_str(), "b");
        assert!(queues.pop_front(&user).is_none());
        assert_eq!(queues.total(), 0);
    }

    #[test]
    fn test_push_front_refuses_when_full() {
        let queues = MessageQueues::new(1);
        let user = UserId::new("u1");
        queues.push_back(&user, msg("a"));
        assert!(!queues.push_front(&user, msg("b")));
        assert_eq!(queues.depth(&user), 1);
    }

    #[test]
    fn test_remove_expired() {
        let queues = MessageQueues::new(10);
        let user = UserId::new("u1");
        queues.push_back(&user, msg("keep"));
        queues.push_back(&user, msg("drop").expires_in(Duration::seconds(1)));
        let removed = queues.remove_expired(Utc::now() + Duration::seconds(5));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id.as_str(), "drop");
        assert_eq!(queues.depth(&user), 1);
    }
}
