//! Registry of attached sessions indexed by user.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::Namespace;

use super::TransportSink;
use super::session::{SessionHandle, SessionId, SessionInfo};

/// Outbound frames buffered per session before frames are dropped.
pub const SESSION_BUFFER: usize = 256;

/// Thread-safe registry of live sessions; implements [`TransportSink`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_user: DashMap<UserId, Vec<Arc<SessionHandle>>>,
    by_id: DashMap<SessionId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session and return its handle plus the receiving end of its
    /// outbound channel.
    pub fn attach(&self, user_id: UserId, namespace: Namespace) -> (Arc<SessionHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let handle = Arc::new(SessionHandle::new(user_id, namespace, tx));
        self.by_id.insert(handle.id, Arc::clone(&handle));
        self.by_user
            .entry(handle.user_id.clone())
            .or_default()
            .push(Arc::clone(&handle));
        debug!(session_id = %handle.id, user_id = %handle.user_id, namespace = %namespace, "Session attached");
        (handle, rx)
    }

    /// Remove a session.
    pub fn detach(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        let (_, handle) = self.by_id.remove(session_id)?;
        handle.mark_dead();
        if let Some(mut sessions) = self.by_user.get_mut(&handle.user_id) {
            sessions.retain(|s| s.id != *session_id);
            if sessions.is_empty() {
                drop(sessions);
                self.by_user.remove_if(&handle.user_id, |_, v| v.is_empty());
            }
        }
        debug!(session_id = %handle.id, user_id = %handle.user_id, "Session detached");
        Some(handle)
    }

    /// Live sessions of a user on a namespace.
    pub fn sessions_for(&self, user_id: &UserId, namespace: Namespace) -> Vec<Arc<SessionHandle>> {
        self.by_user
            .get(user_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|s| s.namespace == namespace && s.is_alive())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every dead session. Returns the number removed.
    pub fn prune_dead(&self) -> usize {
        let dead: Vec<SessionId> = self
            .by_id
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| *entry.key())
            .collect();
        for id in &dead {
            self.detach(id);
        }
        dead.len()
    }

    fn prune_user(&self, user_id: &UserId) {
        let dead: Vec<SessionId> = self
            .by_user
            .get(user_id)
            .map(|entry| entry.iter().filter(|s| !s.is_alive()).map(|s| s.id).collect())
            .unwrap_or_default();
        for id in &dead {
            self.detach(id);
        }
    }

    pub fn session_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.by_id.iter().map(|entry| entry.value().info()).collect()
    }
}

#[async_trait]
impl TransportSink for SessionRegistry {
    async fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.by_user
            .get(user_id)
            .is_some_and(|sessions| sessions.iter().any(|s| s.is_alive()))
    }

    async fn is_connected_on(&self, user_id: &UserId, namespace: Namespace) -> bool {
        !self.sessions_for(user_id, namespace).is_empty()
    }

    async fn deliver(&self, user_id: &UserId, namespace: Namespace, payload: &str) -> AppResult<bool> {
        let sessions = self.sessions_for(user_id, namespace);
        let mut accepted = false;
        for session in &sessions {
            accepted |= session.try_send(payload);
        }
        self.prune_user(user_id);
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_reaches_every_session_on_namespace() {
        let registry = SessionRegistry::new();
        let user = UserId::new("alice");
        let (_a, mut rx_a) = registry.attach(user.clone(), Namespace::General);
        let (_b, mut rx_b) = registry.attach(user.clone(), Namespace::General);
        let (_c, mut rx_admin) = registry.attach(user.clone(), Namespace::Admin);

        assert!(registry.deliver(&user, Namespace::General, "frame").await.unwrap());
        assert_eq!(rx_a.recv().await.as_deref(), Some("frame"));
        assert_eq!(rx_b.recv().await.as_deref(), Some("frame"));
        assert!(rx_admin.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_sessions_are_pruned() {
        let registry = SessionRegistry::new();
        let user = UserId::new("bob");
        let (_handle, rx) = registry.attach(user.clone(), Namespace::General);
        assert!(registry.is_user_connected(&user).await);

        drop(rx);
        assert!(!registry.deliver(&user, Namespace::General, "frame").await.unwrap());
        assert!(!registry.is_user_connected(&user).await);
        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.user_count(), 0);
    }

    #[tokio::test]
    async fn test_detach_removes_user_entry() {
        let registry = SessionRegistry::new();
        let (handle, _rx) = registry.attach(UserId::new("carol"), Namespace::General);
        assert!(registry.detach(&handle.id).is_some());
        assert!(registry.detach(&handle.id).is_none());
        assert_eq!(registry.user_count(), 0);
    }
}
