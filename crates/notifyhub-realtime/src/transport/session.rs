//! A single attached client session.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use notifyhub_core::types::UserId;
use notifyhub_entity::Namespace;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Handle to one live session.
///
/// Holds the sender half of the session's outbound channel plus the user
/// and namespace it listens on.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub user_id: UserId,
    pub namespace: Namespace,
    sender: mpsc::Sender<String>,
    pub connected_at: DateTime<Utc>,
    alive: AtomicBool,
}

impl SessionHandle {
    pub fn new(user_id: UserId, namespace: Namespace, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            namespace,
            sender,
            connected_at: Utc::now(),
            alive: AtomicBool::new(true),
        }
    }

    /// Push a frame without waiting. A full buffer drops the frame; a closed
    /// channel marks the session dead.
    pub fn try_send(&self, payload: &str) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(payload.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.id, user_id = %self.user_id, "Session send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.sender.is_closed()
    }

    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            user_id: self.user_id.clone(),
            namespace: self.namespace,
            connected_at: self.connected_at,
            alive: self.is_alive(),
        }
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub user_id: UserId,
    pub namespace: Namespace,
    pub connected_at: DateTime<Utc>,
    pub alive: bool,
}
