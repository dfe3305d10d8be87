//! Durable and in-memory record of accepted notifications.
//!
//! A message is written here before it is routed, so every later state
//! change (direct delivery, batch flush, replay) finds its row.

use std::sync::Arc;

use tracing::error;

use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_database::NotificationStore;
use notifyhub_entity::NotificationMessage;

use crate::metrics::EngineMetrics;

use super::history::NotificationHistory;

/// Store writes plus the short per-user history.
#[derive(Debug)]
pub struct DeliveryLedger {
    store: Arc<dyn NotificationStore>,
    persist: bool,
    history: NotificationHistory,
    metrics: Arc<EngineMetrics>,
}

impl DeliveryLedger {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        persist: bool,
        history: NotificationHistory,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            store,
            persist,
            history,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn history(&self) -> &NotificationHistory {
        &self.history
    }

    pub fn persists(&self) -> bool {
        self.persist
    }

    /// Record a message that passed admission. Storage failures are logged
    /// and leave the in-memory history intact.
    pub async fn accepted(&self, user_id: &UserId, message: &NotificationMessage) {
        EngineMetrics::inc(&self.metrics.sent);
        if self.persist {
            match self.store.insert(message).await {
                Ok(()) => EngineMetrics::inc(&self.metrics.persisted),
                Err(e) => {
                    error!(user_id = %user_id, message_id = %message.id, error = %e, "Failed to persist notification");
                    EngineMetrics::inc(&self.metrics.persist_failures);
                }
            }
        }
        self.history.record(user_id, message.clone());
    }

    /// Mirror a successful delivery to the history and the store.
    pub async fn delivered(&self, user_id: &UserId, message_id: &NotificationId) {
        self.history.mark_delivered(user_id, message_id);
        if self.persist {
            if let Err(e) = self.store.update_delivered_flag(message_id, true).await {
                error!(user_id = %user_id, message_id = %message_id, error = %e, "Failed to persist delivered flag");
                EngineMetrics::inc(&self.metrics.persist_failures);
            }
        }
    }

    /// Mirror a read acknowledgement to the history and the store.
    pub async fn read(&self, user_id: &UserId, message_id: &NotificationId) {
        self.history.mark_read(user_id, message_id);
        if self.persist {
            if let Err(e) = self.store.update_read_flag(message_id, true).await {
                error!(user_id = %user_id, message_id = %message_id, error = %e, "Failed to persist read flag");
                EngineMetrics::inc(&self.metrics.persist_failures);
            }
        }
    }
}
