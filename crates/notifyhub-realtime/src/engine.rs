//! Process-wide engine context.
//!
//! Built once at startup and passed by reference to the HTTP layer and
//! the scheduler. Owns the background tasks and tears them down on
//! shutdown.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use notifyhub_core::config::AppConfig;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_core::AppError;
use notifyhub_database::{NotificationStore, UserDirectory};
use notifyhub_entity::Namespace;
use notifyhub_perf::MemoryManager;

use crate::notification::manager::NotificationManager;
use crate::transport::{SessionHandle, SessionId, SessionRegistry, TransportSink};

/// Component health summary.
#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub store_healthy: bool,
    pub sessions: usize,
    pub connected_users: usize,
    pub queued: usize,
    pub pending_batches: usize,
}

/// Owns the manager, session registry and background tasks.
#[derive(Debug)]
pub struct NotificationEngine {
    config: AppConfig,
    manager: Arc<NotificationManager>,
    sessions: Option<Arc<SessionRegistry>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationEngine {
    /// Build an engine over an external transport sink.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn UserDirectory>,
        transport: Arc<dyn TransportSink>,
    ) -> AppResult<Self> {
        let memory = Arc::new(MemoryManager::new(config.performance.memory.clone()));
        Self::build(config, store, directory, transport, None, memory)
    }

    /// Build an engine delivering through an in-process session registry.
    pub fn with_session_registry(
        config: AppConfig,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> AppResult<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let memory = Arc::new(MemoryManager::new(config.performance.memory.clone()));
        let transport: Arc<dyn TransportSink> = registry.clone();
        Self::build(config, store, directory, transport, Some(registry), memory)
    }

    fn build(
        config: AppConfig,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn UserDirectory>,
        transport: Arc<dyn TransportSink>,
        sessions: Option<Arc<SessionRegistry>>,
        memory: Arc<MemoryManager>,
    ) -> AppResult<Self> {
        config.validate()?;
        let manager = Arc::new(NotificationManager::new(&config, store, directory, transport, memory));
        Ok(Self {
            config,
            manager,
            sessions,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<NotificationManager> {
        &self.manager
    }

    pub fn sessions(&self) -> Option<&Arc<SessionRegistry>> {
        self.sessions.as_ref()
    }

    /// Token cancelled on shutdown, for tasks owned elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn background timers.
    pub fn start(&self) {
        let memory = Arc::clone(self.manager.optimizer().memory());
        if let Some(handle) = memory.spawn_monitor(self.cancel.child_token()) {
            self.tasks.lock().unwrap_or_else(|e| e.into_inner()).push(handle);
        }
        info!("Notification engine started");
    }

    /// Attach a session for `user_id` on `namespace` and replay the user's
    /// queues in the background.
    pub async fn connect(
        &self,
        user_id: &UserId,
        namespace: Namespace,
    ) -> AppResult<(Arc<SessionHandle>, mpsc::Receiver<String>)> {
        let registry = self
            .sessions
            .as_ref()
            .ok_or_else(|| AppError::service_unavailable("Engine has no session registry"))?;

        let Some(role) = self.manager.router().resolve_role(user_id).await else {
            return Err(AppError::not_found(format!("Unknown user '{user_id}'")));
        };
        if !self.manager.router().policy().reachable_namespaces(role).contains(&namespace) {
            warn!(
                target: "notifyhub::security",
                user_id = %user_id,
                role = %role,
                namespace = %namespace,
                "Session attach denied"
            );
            return Err(AppError::authorization(format!(
                "Role '{role}' may not attach to {namespace}"
            )));
        }

        let (handle, rx) = registry.attach(user_id.clone(), namespace);
        if self.config.notifications.replay_on_connect {
            let manager = Arc::clone(&self.manager);
            let user_id = user_id.clone();
            tokio::spawn(async move {
                manager.replay(&user_id).await;
            });
        }
        Ok((handle, rx))
    }

    pub fn disconnect(&self, session_id: &SessionId) {
        if let Some(registry) = &self.sessions {
            registry.detach(session_id);
        }
    }

    pub async fn health(&self) -> EngineHealth {
        let store_healthy = match self.manager.store().health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(error = %e, "Store health check failed");
                false
            }
        };
        let stats = self.manager.stats();
        EngineHealth {
            store_healthy,
            sessions: self.sessions.as_ref().map_or(0, |r| r.session_count()),
            connected_users: self.sessions.as_ref().map_or(0, |r| r.user_count()),
            queued: stats.total_queued(),
            pending_batches: stats.performance.batch.pending_batches,
        }
    }

    /// Cancel timers and flush pending batches.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        let flushed = self.manager.flush().await;
        info!(flushed_batches = flushed, "Notification engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use notifyhub_database::{InMemoryNotificationStore, StaticUserDirectory};
    use notifyhub_entity::{NotificationCategory, NotificationKind, NotificationMessage, UserRole};

    use super::*;

    fn engine(directory: StaticUserDirectory) -> NotificationEngine {
        NotificationEngine::with_session_registry(
            AppConfig::default(),
            Arc::new(InMemoryNotificationStore::new()),
            Arc::new(directory),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_admin_namespace_requires_admin() {
        let engine = engine(
            StaticUserDirectory::new()
                .with_user("root", UserRole::Admin)
                .with_user("eve", UserRole::Viewer),
        );
        assert!(engine.connect(&UserId::new("root"), Namespace::Admin).await.is_ok());
        let err = engine.connect(&UserId::new("eve"), Namespace::Admin).await.unwrap_err();
        assert_eq!(err.kind, notifyhub_core::error::ErrorKind::Authorization);
        assert!(engine.connect(&UserId::new("ghost"), Namespace::General).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_replays_queued_messages() {
        let engine = engine(StaticUserDirectory::new().with_user("alice", UserRole::Viewer));
        let user = UserId::new("alice");
        let msg = NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, "hello", "queued");
        assert!(engine.manager().send(&user, msg).await);
        assert_eq!(engine.manager().queue_depth(&user), 1);

        let (_handle, mut rx) = engine.connect(&user, Namespace::General).await.unwrap();
        let frame = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["notification"]["title"], "hello");
        assert_eq!(engine.manager().queue_depth(&user), 0);
        engine.shutdown().await;
    }
}
