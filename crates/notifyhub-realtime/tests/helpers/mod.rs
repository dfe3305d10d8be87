//! Shared fixtures for notification engine integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use notifyhub_core::config::AppConfig;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_database::{InMemoryNotificationStore, StaticUserDirectory};
use notifyhub_entity::{Namespace, NotificationCategory, NotificationKind, NotificationMessage, UserRole};
use notifyhub_perf::MemoryManager;
use notifyhub_realtime::{NotificationManager, TransportSink};

/// A frame handed to the transport.
#[derive(Debug, Clone)]
pub struct Frame {
    pub user_id: UserId,
    pub namespace: Namespace,
    pub json: serde_json::Value,
}

impl Frame {
    /// Title of a single-notification frame.
    pub fn title(&self) -> Option<&str> {
        self.json["notification"]["title"].as_str()
    }

    pub fn kind(&self) -> &str {
        self.json["type"].as_str().unwrap_or_default()
    }
}

/// Transport that records frames for users marked online.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    online: Mutex<HashSet<UserId>>,
    failing: AtomicBool,
    frames: Mutex<Vec<Frame>>,
}

impl RecordingTransport {
    pub fn set_online(&self, user_id: &str, online: bool) {
        let mut set = self.online.lock().unwrap();
        if online {
            set.insert(UserId::new(user_id));
        } else {
            set.remove(&UserId::new(user_id));
        }
    }

    /// Connected users still appear online but every delivery fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn titles_for(&self, user_id: &str) -> Vec<String> {
        self.frames()
            .iter()
            .filter(|f| f.user_id.as_str() == user_id)
            .filter_map(|f| f.title().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl TransportSink for RecordingTransport {
    async fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.online.lock().unwrap().contains(user_id)
    }

    async fn deliver(&self, user_id: &UserId, namespace: Namespace, payload: &str) -> AppResult<bool> {
        if self.failing.load(Ordering::SeqCst) || !self.online.lock().unwrap().contains(user_id) {
            return Ok(false);
        }
        self.frames.lock().unwrap().push(Frame {
            user_id: user_id.clone(),
            namespace,
            json: serde_json::from_str(payload)?,
        });
        Ok(true)
    }
}

/// Everything a test needs to drive and observe the manager.
pub struct Harness {
    pub manager: NotificationManager,
    pub store: Arc<InMemoryNotificationStore>,
    pub directory: Arc<StaticUserDirectory>,
    pub transport: Arc<RecordingTransport>,
}

/// Default configuration with duplicate suppression off so tests can
/// repeat titles freely.
pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.notifications.dedup_window_ms = 0;
    config.performance.batching.enabled = false;
    config
}

pub fn harness(config: AppConfig) -> Harness {
    let store = Arc::new(InMemoryNotificationStore::new());
    let directory = Arc::new(
        StaticUserDirectory::new()
            .with_user("root", UserRole::Admin)
            .with_user("mod", UserRole::Moderator)
            .with_user("alice", UserRole::Viewer)
            .with_user("bob", UserRole::Viewer),
    );
    let transport = Arc::new(RecordingTransport::default());
    let memory = Arc::new(MemoryManager::new(config.performance.memory.clone()));
    let manager = NotificationManager::new(&config, store.clone(), directory.clone(), transport.clone(), memory);
    Harness {
        manager,
        store,
        directory,
        transport,
    }
}

pub fn message(title: &str) -> NotificationMessage {
    NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, title, "body")
}
