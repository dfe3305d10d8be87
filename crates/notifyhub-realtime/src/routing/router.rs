//! Delivery router.
//!
//! A message moves `CREATED -> AUTHORIZED | REJECTED`, then either reaches a
//! live session (`DELIVERED`) or lands on the user's offline queue
//! (`QUEUED`). Queued messages are `REPLAYED` on reconnect or become
//! `EXPIRED`. An authorized message is written to the ledger before its
//! first delivery attempt; later transitions update that record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::sync::Cache;
use tracing::{debug, warn};

use notifyhub_core::types::UserId;
use notifyhub_database::UserDirectory;
use notifyhub_entity::{NotificationMessage, UserRole};
use notifyhub_perf::{DeliveryPlan, PerformanceOptimizer, ThrottleDecision};

use crate::authorization::{AuthorizationPolicy, SecurityAuditLog};
use crate::metrics::EngineMetrics;
use crate::notification::DeliveryLedger;

use super::delivery::DeliveryTracker;
use super::offline_queue::MessageQueues;
use super::online::OnlineDelivery;

/// Role lookups kept before asking the directory again.
const ROLE_CACHE_CAPACITY: u64 = 10_000;
const ROLE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Where a routed message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Accepted by at least one live session.
    Delivered,
    /// Handed to the batcher for a live session.
    Batched,
    /// Already delivered to this user within the cache TTL.
    Cached,
    /// Placed on the offline queue.
    Queued,
    /// Past its expiry; not delivered or queued.
    Expired,
    /// The recipient's role may not receive the message.
    Denied,
}

impl RouteOutcome {
    /// Whether the message was accepted for delivery.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Expired | Self::Denied)
    }
}

/// Per-recipient results of a fan-out.
#[derive(Debug, Default)]
pub struct FanOut {
    /// Recipient copy and where it went.
    pub deliveries: Vec<(NotificationMessage, RouteOutcome)>,
    /// Recipients skipped because their role may not see the message.
    pub skipped: usize,
    /// Recipients dropped by the global throttle.
    pub throttled: usize,
}

impl FanOut {
    pub fn recipients(&self) -> usize {
        self.deliveries.len() + self.skipped + self.throttled
    }

    pub fn accepted(&self) -> usize {
        self.deliveries.iter().filter(|(_, o)| o.is_accepted()).count()
    }

    /// Partial success counts as success.
    pub fn is_success(&self) -> bool {
        self.accepted() > 0
    }
}

/// Result of draining one queue on reconnect.
#[derive(Debug, Default)]
pub struct ReplayProgress {
    /// Messages delivered, in queue order.
    pub delivered: Vec<NotificationMessage>,
    /// Entries dropped because they expired or are no longer authorized.
    pub dropped: usize,
    /// Whether a failed delivery stopped the drain.
    pub interrupted: bool,
}

/// Decides between online delivery and offline queuing.
#[derive(Debug)]
pub struct DeliveryRouter {
    policy: AuthorizationPolicy,
    audit: Arc<SecurityAuditLog>,
    directory: Arc<dyn UserDirectory>,
    roles: Cache<UserId, UserRole>,
    online: Arc<OnlineDelivery>,
    optimizer: Arc<PerformanceOptimizer>,
    offline: Arc<MessageQueues>,
    retry: Arc<MessageQueues>,
    tracker: Arc<DeliveryTracker>,
    ledger: Arc<DeliveryLedger>,
    metrics: Arc<EngineMetrics>,
}

impl DeliveryRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: AuthorizationPolicy,
        audit: Arc<SecurityAuditLog>,
        directory: Arc<dyn UserDirectory>,
        online: Arc<OnlineDelivery>,
        optimizer: Arc<PerformanceOptimizer>,
        offline: Arc<MessageQueues>,
        retry: Arc<MessageQueues>,
        tracker: Arc<DeliveryTracker>,
        ledger: Arc<DeliveryLedger>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            policy,
            audit,
            directory,
            roles: Cache::builder()
                .max_capacity(ROLE_CACHE_CAPACITY)
                .time_to_live(ROLE_CACHE_TTL)
                .build(),
            online,
            optimizer,
            offline,
            retry,
            tracker,
            ledger,
            metrics,
        }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    pub fn audit(&self) -> &SecurityAuditLog {
        &self.audit
    }

    pub fn optimizer(&self) -> &Arc<PerformanceOptimizer> {
        &self.optimizer
    }

    pub fn offline(&self) -> &MessageQueues {
        &self.offline
    }

    pub fn retry(&self) -> &MessageQueues {
        &self.retry
    }

    pub fn tracker(&self) -> &DeliveryTracker {
        &self.tracker
    }

    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }

    /// Look up a user's role. Directory errors are logged and reported as
    /// an unknown role.
    pub async fn resolve_role(&self, user_id: &UserId) -> Option<UserRole> {
        if let Some(role) = self.roles.get(user_id) {
            return Some(role);
        }
        match self.directory.get_role(user_id).await {
            Ok(Some(role)) => {
                self.roles.insert(user_id.clone(), role);
                Some(role)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Role lookup failed, treating role as unknown");
                None
            }
        }
    }

    /// Forget a cached role after it changed upstream.
    pub fn invalidate_role(&self, user_id: &UserId) {
        self.roles.invalidate(user_id);
    }

    /// Route one message to one user.
    pub async fn route_to_user(
        &self,
        user_id: &UserId,
        role: UserRole,
        message: &mut NotificationMessage,
    ) -> RouteOutcome {
        let Some(namespace) = self.policy.resolve_namespace(role, message) else {
            self.audit
                .record(user_id, &message.id, message.category, format!("role {role} may not receive category"));
            EngineMetrics::inc(&self.metrics.rejected_authorization);
            return RouteOutcome::Denied;
        };

        if message.is_expired() {
            self.tracker.mark_expired(&message.id);
            EngineMetrics::inc(&self.metrics.rejected_expired);
            return RouteOutcome::Expired;
        }

        self.ledger.accepted(user_id, message).await;
        self.tracker.begin(&message.id);
        if self.online.transport().is_connected_on(user_id, namespace).await {
            match self
                .optimizer
                .optimize_message_delivery(user_id, namespace, message)
                .await
            {
                DeliveryPlan::CacheHit => {
                    message.mark_delivered();
                    self.ledger.delivered(user_id, &message.id).await;
                    EngineMetrics::inc(&self.metrics.cached);
                    return RouteOutcome::Cached;
                }
                DeliveryPlan::Batched => {
                    EngineMetrics::inc(&self.metrics.batched);
                    return RouteOutcome::Batched;
                }
                DeliveryPlan::Direct => {
                    if self.online.attempt(user_id, namespace, message).await {
                        message.mark_delivered();
                        self.ledger.delivered(user_id, &message.id).await;
                        self.optimizer.record_delivered(user_id, message);
                        return RouteOutcome::Delivered;
                    }
                    debug!(user_id = %user_id, message_id = %message.id, "Online attempt failed, queuing");
                }
            }
        }

        self.enqueue_offline(user_id, message.clone());
        RouteOutcome::Queued
    }

    /// Record an authorized message and queue it offline without a delivery
    /// attempt. Returns the new queue depth.
    pub async fn deflect(&self, user_id: &UserId, message: NotificationMessage) -> usize {
        self.ledger.accepted(user_id, &message).await;
        EngineMetrics::inc(&self.metrics.deflected);
        self.enqueue_offline(user_id, message)
    }

    /// Put a message on the user's offline queue. Returns the new depth.
    fn enqueue_offline(&self, user_id: &UserId, message: NotificationMessage) -> usize {
        let pushed = self.offline.push_back(user_id, message);
        EngineMetrics::inc(&self.metrics.queued);
        if let Some(evicted) = pushed.evicted {
            EngineMetrics::inc(&self.metrics.queue_evictions);
            debug!(user_id = %user_id, message_id = %evicted.id, "Offline queue full, evicted oldest");
        }
        pushed.depth
    }

    /// Fan a message out to every administrator.
    pub async fn route_to_admins(&self, message: &NotificationMessage) -> FanOut {
        let admins = match self.directory.list_user_ids_by_role(UserRole::Admin).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Failed to list administrators");
                Vec::new()
            }
        };
        let recipients = admins.into_iter().map(|id| (id, Some(UserRole::Admin))).collect();
        self.fan_out(message, recipients).await
    }

    /// Fan a message out to every active user allowed to see it.
    pub async fn route_broadcast(&self, message: &NotificationMessage) -> FanOut {
        let users = match self.directory.list_active_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Failed to list active users");
                Vec::new()
            }
        };
        let mut recipients = Vec::with_capacity(users.len());
        for user_id in users {
            let role = self.resolve_role(&user_id).await;
            recipients.push((user_id, role));
        }
        self.fan_out(message, recipients).await
    }

    async fn fan_out(&self, message: &NotificationMessage, recipients: Vec<(UserId, Option<UserRole>)>) -> FanOut {
        EngineMetrics::inc(&self.metrics.fanouts);
        let mut result = FanOut::default();
        for (user_id, role) in recipients {
            let role = role.unwrap_or(UserRole::Viewer);
            if !self.policy.is_authorized(role, message) {
                result.skipped += 1;
                continue;
            }
            let mut copy = message.recipient_copy(&user_id);
            match self.optimizer.admit_fanout(message.priority) {
                ThrottleDecision::Allow => {
                    let outcome = self.route_to_user(&user_id, role, &mut copy).await;
                    result.deliveries.push((copy, outcome));
                }
                ThrottleDecision::Reject(reason) if reason.is_deflectable() => {
                    self.deflect(&user_id, copy.clone()).await;
                    result.deliveries.push((copy, RouteOutcome::Queued));
                }
                ThrottleDecision::Reject(reason) => {
                    EngineMetrics::inc(&self.metrics.rejected_rate_limit);
                    debug!(user_id = %user_id, message_id = %message.id, %reason, "Fan-out recipient throttled");
                    result.throttled += 1;
                }
            }
        }
        debug!(
            message_id = %message.id,
            recipients = result.recipients(),
            accepted = result.accepted(),
            skipped = result.skipped,
            throttled = result.throttled,
            "Fan-out complete"
        );
        result
    }

    /// Drain one of the user's queues in FIFO order over direct delivery.
    /// A failed delivery is put back at the head and stops the drain.
    pub async fn drain_queue(&self, user_id: &UserId, role: UserRole, queue: &MessageQueues) -> ReplayProgress {
        let mut progress = ReplayProgress::default();
        if !self.online.transport().is_user_connected(user_id).await {
            return progress;
        }
        while let Some(mut message) = queue.pop_front(user_id) {
            if message.is_expired_at(Utc::now()) {
                self.tracker.mark_expired(&message.id);
                progress.dropped += 1;
                continue;
            }
            let Some(namespace) = self.policy.resolve_namespace(role, &message) else {
                self.audit
                    .record(user_id, &message.id, message.category, format!("role {role} lost access before replay"));
                progress.dropped += 1;
                continue;
            };
            if !self.online.transport().is_connected_on(user_id, namespace).await
                || !self.online.attempt(user_id, namespace, &message).await
            {
                if !queue.push_front(user_id, message) {
                    EngineMetrics::inc(&self.metrics.queue_evictions);
                }
                progress.interrupted = true;
                break;
            }
            message.mark_delivered();
            self.ledger.delivered(user_id, &message.id).await;
            self.optimizer.record_delivered(user_id, &message);
            progress.delivered.push(message);
        }
        progress
    }

    /// Drop expired entries from both queues.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = self.offline.remove_expired(now);
        removed.extend(self.retry.remove_expired(now));
        for message in &removed {
            self.tracker.mark_expired(&message.id);
        }
        removed.len()
    }
}
