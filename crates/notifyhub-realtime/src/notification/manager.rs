//! Unified notification manager.
//!
//! The only entry point producers use. A send runs
//! validate -> dedup -> throttle -> authorize -> record -> route. The record
//! (store row and history entry) exists before any delivery attempt.
//! Expected rejections come back as [`SendOutcome::Rejected`]; storage and
//! transport failures are logged and never reach the caller.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashSet;
use tracing::{debug, error, info, warn};

use notifyhub_cache::keys;
use notifyhub_core::config::{AppConfig, NotificationConfig, OptimizationLevel};
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_database::{NotificationStore, UserDirectory};
use notifyhub_entity::{NotificationMessage, UserRole};
use notifyhub_perf::{MemoryManager, PerformanceOptimizer, ThrottleDecision};

use crate::authorization::{AuthorizationPolicy, SecurityAuditLog};
use crate::metrics::EngineMetrics;
use crate::routing::{DeliveryRouter, DeliveryTracker, FanOut, MessageQueues, OnlineDelivery, RouteOutcome};
use crate::stats::NotificationStats;
use crate::transport::TransportSink;

use super::dedup::Deduplicator;
use super::history::NotificationHistory;
use super::ledger::DeliveryLedger;
use super::outcome::{FanOutOutcome, FanOutSummary, RejectReason, SendOutcome};
use super::validator::MessageValidator;

/// Counts from one cleanup pass.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CleanupReport {
    pub queued_expired: usize,
    pub history_expired: usize,
    pub stored_expired: u64,
    pub stored_retention: u64,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.queued_expired
            + self.history_expired
            + usize::try_from(self.stored_expired + self.stored_retention).unwrap_or(usize::MAX)
    }
}

/// Counts from one pruning pass.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct PruneReport {
    pub performance: usize,
    pub dedup_keys: usize,
    pub tracker_entries: usize,
}

/// Removes the user from the replay set when dropped.
struct ReplayGuard<'a> {
    set: &'a DashSet<UserId>,
    user_id: UserId,
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.user_id);
    }
}

/// Façade over validation, throttling, routing, persistence and history.
#[derive(Debug)]
pub struct NotificationManager {
    config: NotificationConfig,
    validator: MessageValidator,
    dedup: Deduplicator,
    ledger: Arc<DeliveryLedger>,
    router: DeliveryRouter,
    store: Arc<dyn NotificationStore>,
    metrics: Arc<EngineMetrics>,
    replaying: DashSet<UserId>,
}

impl NotificationManager {
    /// Build the manager and every component beneath it.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn UserDirectory>,
        transport: Arc<dyn TransportSink>,
        memory: Arc<MemoryManager>,
    ) -> Self {
        let notifications = config.notifications.clone();
        let metrics = Arc::new(EngineMetrics::new());
        let tracker = Arc::new(DeliveryTracker::new());
        let offline = Arc::new(MessageQueues::new(notifications.max_offline_messages));
        let retry = Arc::new(MessageQueues::new(notifications.max_offline_messages));
        let ledger = Arc::new(DeliveryLedger::new(
            Arc::clone(&store),
            notifications.persist_enabled,
            NotificationHistory::new(notifications.max_history_per_user),
            Arc::clone(&metrics),
        ));

        let online = Arc::new(OnlineDelivery::new(
            transport,
            Arc::clone(&tracker),
            Arc::clone(&retry),
            Arc::clone(&ledger),
            Arc::clone(&metrics),
        ));
        let optimizer = Arc::new(PerformanceOptimizer::new(config, online.clone(), memory));
        let router = DeliveryRouter::new(
            AuthorizationPolicy::new(),
            Arc::new(SecurityAuditLog::new(notifications.audit_capacity)),
            directory,
            online,
            optimizer,
            offline,
            retry,
            tracker,
            Arc::clone(&ledger),
            Arc::clone(&metrics),
        );

        info!(
            max_offline_messages = notifications.max_offline_messages,
            persist_enabled = notifications.persist_enabled,
            dedup_window_ms = notifications.dedup_window_ms,
            level = %config.performance.level,
            "Notification manager initialized"
        );

        Self {
            validator: MessageValidator::new(&notifications),
            dedup: Deduplicator::new(notifications.dedup_window_ms),
            ledger,
            config: notifications,
            router,
            store,
            metrics,
            replaying: DashSet::new(),
        }
    }

    pub fn router(&self) -> &DeliveryRouter {
        &self.router
    }

    pub fn optimizer(&self) -> &Arc<PerformanceOptimizer> {
        self.router.optimizer()
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    // ── Producer entry points ───────────────────────────────────────

    /// Send to one user. `true` when delivered or queued.
    pub async fn send(&self, user_id: &UserId, message: NotificationMessage) -> bool {
        self.send_detailed(user_id, message).await.is_accepted()
    }

    /// Send to one user and report what happened.
    pub async fn send_detailed(&self, user_id: &UserId, message: NotificationMessage) -> SendOutcome {
        self.send_from(user_id, message, None).await
    }

    /// Send on behalf of a request from `ip`, which is throttled separately.
    pub async fn send_from(
        &self,
        user_id: &UserId,
        mut message: NotificationMessage,
        ip: Option<&str>,
    ) -> SendOutcome {
        message.user_id = Some(user_id.clone());

        if let Err(issue) = self.validator.sanitize_and_validate(&mut message) {
            warn!(user_id = %user_id, message_id = %message.id, %issue, "Notification rejected by validation");
            EngineMetrics::inc(&self.metrics.rejected_validation);
            return SendOutcome::Rejected(RejectReason::Validation);
        }

        if self.dedup.is_enabled()
            && !self
                .dedup
                .should_send(&keys::dedup(user_id, message.category, &message.title))
        {
            debug!(user_id = %user_id, message_id = %message.id, "Duplicate notification suppressed");
            EngineMetrics::inc(&self.metrics.duplicates);
            return SendOutcome::Rejected(RejectReason::Duplicate);
        }

        if message.is_expired() {
            self.router.tracker().mark_expired(&message.id);
            EngineMetrics::inc(&self.metrics.rejected_expired);
            return SendOutcome::Rejected(RejectReason::Expired);
        }

        let role = self.router.resolve_role(user_id).await;
        let decision = self.optimizer().admit(user_id, role, message.priority, ip);
        let deflect = match decision {
            ThrottleDecision::Allow => false,
            ThrottleDecision::Reject(reason) if reason.is_deflectable() => true,
            ThrottleDecision::Reject(reason) => {
                warn!(
                    user_id = %user_id,
                    message_id = %message.id,
                    priority = %message.priority,
                    %reason,
                    "Notification rate limited"
                );
                EngineMetrics::inc(&self.metrics.rejected_rate_limit);
                return SendOutcome::Rejected(RejectReason::RateLimited(reason));
            }
        };

        let role = role.unwrap_or(UserRole::Viewer);
        if !self.router.policy().is_authorized(role, &message) {
            self.router.audit().record(
                user_id,
                &message.id,
                message.category,
                format!("role {role} may not receive category"),
            );
            EngineMetrics::inc(&self.metrics.rejected_authorization);
            return SendOutcome::Rejected(RejectReason::Authorization);
        }

        let outcome = if deflect {
            let depth = self.router.deflect(user_id, message.clone()).await;
            debug!(user_id = %user_id, message_id = %message.id, depth, "Backpressure deflected notification to offline queue");
            SendOutcome::Deflected
        } else {
            match self.router.route_to_user(user_id, role, &mut message).await {
                RouteOutcome::Delivered => SendOutcome::Delivered,
                RouteOutcome::Batched => SendOutcome::Batched,
                RouteOutcome::Cached => SendOutcome::Cached,
                RouteOutcome::Queued => SendOutcome::Queued,
                RouteOutcome::Expired => return SendOutcome::Rejected(RejectReason::Expired),
                RouteOutcome::Denied => return SendOutcome::Rejected(RejectReason::Authorization),
            }
        };

        debug!(user_id = %user_id, message_id = %message.id, ?outcome, "Notification accepted");
        outcome
    }

    /// Send to every administrator. `true` when at least one accepted it.
    pub async fn send_admin(&self, message: NotificationMessage) -> bool {
        self.send_admin_detailed(message).await.is_accepted()
    }

    pub async fn send_admin_detailed(&self, message: NotificationMessage) -> FanOutOutcome {
        let message = match self.prepare_fan_out(message) {
            Ok(message) => message,
            Err(reason) => return FanOutOutcome::Rejected { reason },
        };
        let fan_out = self.router.route_to_admins(&message).await;
        FanOutOutcome::Completed(Self::summarize(fan_out))
    }

    /// Send to every active user allowed to see the message.
    pub async fn broadcast(&self, message: NotificationMessage) -> bool {
        self.broadcast_detailed(message).await.is_accepted()
    }

    pub async fn broadcast_detailed(&self, message: NotificationMessage) -> FanOutOutcome {
        let message = match self.prepare_fan_out(message) {
            Ok(message) => message,
            Err(reason) => return FanOutOutcome::Rejected { reason },
        };
        let fan_out = self.router.route_broadcast(&message).await;
        FanOutOutcome::Completed(Self::summarize(fan_out))
    }

    fn prepare_fan_out(&self, mut message: NotificationMessage) -> Result<NotificationMessage, RejectReason> {
        message.user_id = None;
        if let Err(issue) = self.validator.sanitize_and_validate(&mut message) {
            warn!(message_id = %message.id, %issue, "Fan-out notification rejected by validation");
            EngineMetrics::inc(&self.metrics.rejected_validation);
            return Err(RejectReason::Validation);
        }
        if message.is_expired() {
            EngineMetrics::inc(&self.metrics.rejected_expired);
            return Err(RejectReason::Expired);
        }
        Ok(message)
    }

    fn summarize(fan_out: FanOut) -> FanOutSummary {
        let mut summary = FanOutSummary {
            recipients: fan_out.recipients(),
            skipped: fan_out.skipped,
            throttled: fan_out.throttled,
            ..FanOutSummary::default()
        };
        for (_, outcome) in &fan_out.deliveries {
            match outcome {
                RouteOutcome::Delivered | RouteOutcome::Batched | RouteOutcome::Cached => summary.delivered += 1,
                RouteOutcome::Queued => summary.queued += 1,
                RouteOutcome::Expired | RouteOutcome::Denied => {}
            }
        }
        summary
    }

    // ── Replay ──────────────────────────────────────────────────────

    /// Deliver the user's offline queue, then retry queue, in FIFO order.
    /// Returns the number delivered. A concurrent replay for the same user
    /// returns 0 immediately.
    pub async fn replay(&self, user_id: &UserId) -> usize {
        if !self.replaying.insert(user_id.clone()) {
            debug!(user_id = %user_id, "Replay already in progress");
            return 0;
        }
        let _guard = ReplayGuard {
            set: &self.replaying,
            user_id: user_id.clone(),
        };

        let role = self.router.resolve_role(user_id).await.unwrap_or(UserRole::Viewer);
        let mut delivered = Vec::new();
        let mut dropped = 0;

        let offline = self.router.drain_queue(user_id, role, self.router.offline()).await;
        dropped += offline.dropped;
        delivered.extend(offline.delivered);
        if !offline.interrupted {
            let retry = self.router.drain_queue(user_id, role, self.router.retry()).await;
            dropped += retry.dropped;
            delivered.extend(retry.delivered);
        }

        let count = delivered.len();
        EngineMetrics::add(&self.metrics.replayed, count as u64);
        if count > 0 || dropped > 0 {
            info!(
                user_id = %user_id,
                replayed = count,
                dropped,
                remaining = self.queue_depth(user_id),
                "Replayed queued notifications"
            );
        }
        count
    }

    // ── State updates ───────────────────────────────────────────────

    /// Mark a message read. Idempotent; `false` when the message does not
    /// exist or belongs to another user.
    pub async fn mark_read(&self, message_id: &NotificationId, user_id: &UserId) -> bool {
        if !self.owns(message_id, user_id).await {
            return false;
        }
        self.ledger.read(user_id, message_id).await;
        true
    }

    /// Mark a message delivered, e.g. on client acknowledgement.
    pub async fn mark_delivered(&self, message_id: &NotificationId, user_id: &UserId) -> bool {
        if !self.owns(message_id, user_id).await {
            return false;
        }
        self.router.tracker().record(message_id, true);
        self.ledger.delivered(user_id, message_id).await;
        true
    }

    async fn owns(&self, message_id: &NotificationId, user_id: &UserId) -> bool {
        if self.ledger.history().get(user_id, message_id).is_some() {
            return true;
        }
        match self.store.find(message_id).await {
            Ok(Some(message)) => message.user_id.as_ref() == Some(user_id),
            Ok(None) => false,
            Err(e) => {
                error!(user_id = %user_id, message_id = %message_id, error = %e, "Failed to look up notification");
                false
            }
        }
    }

    // ── Maintenance ─────────────────────────────────────────────────

    /// Remove expired messages everywhere and stored rows past retention.
    pub async fn cleanup_expired(&self) -> CleanupReport {
        let now = Utc::now();
        let mut report = CleanupReport {
            queued_expired: self.router.purge_expired(),
            history_expired: self.ledger.history().remove_expired(now),
            ..CleanupReport::default()
        };

        match self.store.delete_expired_before(now).await {
            Ok(n) => report.stored_expired = n,
            Err(e) => error!(error = %e, "Failed to delete expired notifications"),
        }
        let cutoff = now - ChronoDuration::days(i64::from(self.config.retention_days));
        match self.store.delete_older_than(cutoff).await {
            Ok(n) => report.stored_retention = n,
            Err(e) => error!(error = %e, "Failed to delete notifications past retention"),
        }

        EngineMetrics::add(&self.metrics.expired_cleaned, report.total() as u64);
        info!(
            queued = report.queued_expired,
            history = report.history_expired,
            stored_expired = report.stored_expired,
            stored_retention = report.stored_retention,
            "Notification cleanup complete"
        );
        report
    }

    /// Drop idle limiter windows, stale dedup keys, settled tracker entries
    /// and expired cache entries.
    pub fn prune(&self) -> PruneReport {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(self.config.retention_days));
        PruneReport {
            performance: self.optimizer().prune(),
            dedup_keys: self.dedup.cleanup(),
            tracker_entries: self.router.tracker().prune(cutoff),
        }
    }

    /// Flush every pending batch.
    pub async fn flush(&self) -> usize {
        self.optimizer().flush().await
    }

    pub fn set_optimization_level(&self, level: OptimizationLevel) {
        self.optimizer().set_level(level);
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Newest first from the durable store, falling back to the in-memory
    /// history when the store is disabled or failing.
    pub async fn get_history(&self, user_id: &UserId, limit: usize) -> Vec<NotificationMessage> {
        if self.config.persist_enabled {
            match self.store.query_history(user_id, limit).await {
                Ok(rows) => return rows,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "History query failed, serving in-memory history");
                }
            }
        }
        self.ledger.history().recent(user_id, limit)
    }

    pub async fn unread_count(&self, user_id: &UserId) -> u64 {
        if self.config.persist_enabled {
            match self.store.count_unread(user_id).await {
                Ok(count) => return count,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Unread count failed, using in-memory history");
                }
            }
        }
        self.ledger.history().unread_count(user_id)
    }

    /// Messages waiting for the user across offline and retry queues.
    pub fn queue_depth(&self, user_id: &UserId) -> usize {
        self.router.offline().depth(user_id) + self.router.retry().depth(user_id)
    }

    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            metrics: self.metrics.snapshot(),
            offline_queued: self.router.offline().total(),
            retry_queued: self.router.retry().total(),
            queue_depths: self.router.offline().depths(),
            history_users: self.ledger.history().user_count(),
            history_entries: self.ledger.history().total(),
            delivery: self.router.tracker().counts(),
            security_events: self.router.audit().total(),
            replays_in_progress: self.replaying.len(),
            performance: self.optimizer().snapshot(),
        }
    }
}
