//! Online delivery through the transport sink.
//!
//! Shared by the router for direct sends and by the batcher when a batch
//! flushes. Failures never propagate: they are reported as `false` and the
//! caller decides where the message goes next.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::{Namespace, NotificationMessage};
use notifyhub_perf::{BatchSink, CompressedBatch};

use crate::metrics::EngineMetrics;
use crate::notification::DeliveryLedger;
use crate::transport::{OutboundFrame, TransportSink};

use super::delivery::DeliveryTracker;
use super::offline_queue::MessageQueues;

/// Delivers frames to live sessions and records the attempts.
#[derive(Debug)]
pub struct OnlineDelivery {
    transport: Arc<dyn TransportSink>,
    tracker: Arc<DeliveryTracker>,
    retry: Arc<MessageQueues>,
    ledger: Arc<DeliveryLedger>,
    metrics: Arc<EngineMetrics>,
}

impl OnlineDelivery {
    pub fn new(
        transport: Arc<dyn TransportSink>,
        tracker: Arc<DeliveryTracker>,
        retry: Arc<MessageQueues>,
        ledger: Arc<DeliveryLedger>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            transport,
            tracker,
            retry,
            ledger,
            metrics,
        }
    }

    pub fn transport(&self) -> &Arc<dyn TransportSink> {
        &self.transport
    }

    /// Attempt one online delivery. `true` when a session accepted it.
    pub async fn attempt(&self, user_id: &UserId, namespace: Namespace, message: &NotificationMessage) -> bool {
        let frame = OutboundFrame::Notification {
            namespace,
            notification: message,
        };
        let payload = match frame.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Failed to serialize notification frame");
                self.tracker.record(&message.id, false);
                EngineMetrics::inc(&self.metrics.failed);
                return false;
            }
        };
        self.send_frame(user_id, namespace, &payload, std::slice::from_ref(message))
            .await
    }

    async fn send_frame(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        payload: &str,
        members: &[NotificationMessage],
    ) -> bool {
        let delivered = match self.transport.deliver(user_id, namespace, payload).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(user_id = %user_id, namespace = %namespace, error = %e, "Transport delivery failed");
                false
            }
        };
        for member in members {
            self.tracker.record(&member.id, delivered);
        }
        if delivered {
            EngineMetrics::add(&self.metrics.delivered, members.len() as u64);
        } else {
            EngineMetrics::add(&self.metrics.failed, members.len() as u64);
        }
        delivered
    }

    /// Mirror the delivered state of batch members that went out after the
    /// send call returned. Their rows were written before batching.
    async fn persist_delivered(&self, user_id: &UserId, members: &[NotificationMessage]) {
        for member in members {
            self.ledger.delivered(user_id, &member.id).await;
        }
    }
}

#[async_trait]
impl BatchSink for OnlineDelivery {
    async fn deliver_one(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        message: &NotificationMessage,
    ) -> AppResult<bool> {
        let delivered = self.attempt(user_id, namespace, message).await;
        if delivered {
            self.persist_delivered(user_id, std::slice::from_ref(message)).await;
        }
        Ok(delivered)
    }

    async fn deliver_compressed(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        batch: &CompressedBatch,
        members: &[NotificationMessage],
    ) -> AppResult<bool> {
        let payload = OutboundFrame::NotificationBatch { namespace, batch }.to_json()?;
        let delivered = self.send_frame(user_id, namespace, &payload, members).await;
        if delivered {
            self.persist_delivered(user_id, members).await;
        }
        Ok(delivered)
    }

    async fn flush_failed(&self, user_id: &UserId, members: Vec<NotificationMessage>) {
        let count = members.len();
        for member in members {
            if member.is_expired() {
                self.tracker.mark_expired(&member.id);
                continue;
            }
            if let Some(evicted) = self.retry.push_back(user_id, member).evicted {
                EngineMetrics::inc(&self.metrics.queue_evictions);
                debug!(user_id = %user_id, message_id = %evicted.id, "Retry queue full, evicted oldest");
            }
        }
        warn!(user_id = %user_id, count, "Batch delivery failed, members moved to retry queue");
    }
}
