//! Single entry point over cache, throttler, batcher and memory manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use notifyhub_cache::{CacheStats, MessageCache};
use notifyhub_core::config::{AppConfig, BatchingConfig, OptimizationLevel};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::{Namespace, NotificationMessage, NotificationPriority, UserRole};

use crate::batch::{BatchSink, BatchStats, CompressedBatch, MessageBatcher};
use crate::memory::{MemoryManager, MemoryStats};
use crate::throttle::{ThrottleDecision, ThrottleStats, Throttler};

/// How the optimizer handled a message bound for a live user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPlan {
    /// Already delivered to this user within the cache TTL.
    CacheHit,
    /// Handed to the batcher; delivery happens on flush.
    Batched,
    /// The caller should deliver immediately.
    Direct,
}

#[derive(Debug, Default)]
struct OptimizerCounters {
    optimized: AtomicU64,
    cache_short_circuits: AtomicU64,
    batched: AtomicU64,
    direct: AtomicU64,
    bytes_processed: AtomicU64,
}

/// Combined performance metrics.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub level: OptimizationLevel,
    pub messages_optimized: u64,
    pub cache_short_circuits: u64,
    pub batched: u64,
    pub direct: u64,
    pub bytes_processed: u64,
    pub cache: CacheStats,
    pub throttle: ThrottleStats,
    pub batch: BatchStats,
    pub memory: MemoryStats,
}

/// Caches batch members once their flush reaches a session.
struct CachingSink {
    inner: Arc<dyn BatchSink>,
    cache: Arc<MessageCache>,
}

#[async_trait]
impl BatchSink for CachingSink {
    async fn deliver_one(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        message: &NotificationMessage,
    ) -> AppResult<bool> {
        let delivered = self.inner.deliver_one(user_id, namespace, message).await?;
        if delivered {
            cache_delivered(&self.cache, user_id, message);
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
        let delivered = self
            .inner
            .deliver_compressed(user_id, namespace, batch, members)
            .await?;
        if delivered {
            for member in members {
                cache_delivered(&self.cache, user_id, member);
            }
        }
        Ok(delivered)
    }

    async fn flush_failed(&self, user_id: &UserId, members: Vec<NotificationMessage>) {
        self.inner.flush_failed(user_id, members).await;
    }
}

fn cache_delivered(cache: &MessageCache, user_id: &UserId, message: &NotificationMessage) {
    if let Err(e) = cache.put(message, Some(user_id)) {
        warn!(message_id = %message.id, error = %e, "Failed to cache delivered message");
    }
}

/// Orchestrates the performance layer and retunes it across levels.
#[derive(Debug)]
pub struct PerformanceOptimizer {
    batching: BatchingConfig,
    cache: Arc<MessageCache>,
    throttler: Arc<Throttler>,
    batcher: MessageBatcher,
    memory: Arc<MemoryManager>,
    level: RwLock<OptimizationLevel>,
    counters: OptimizerCounters,
}

impl PerformanceOptimizer {
    /// Build every component at the configured level.
    pub fn new(config: &AppConfig, sink: Arc<dyn BatchSink>, memory: Arc<MemoryManager>) -> Self {
        let level = config.performance.level;
        let tuning = config.performance.batching.resolve(level);
        let cache = Arc::new(MessageCache::new(&config.cache, tuning.cache_scale));
        let throttler = Arc::new(Throttler::new(config.rate_limit.clone()));
        let sink = Arc::new(CachingSink {
            inner: sink,
            cache: Arc::clone(&cache),
        });
        let batcher = MessageBatcher::new(&config.performance.batching, tuning, sink);

        let hook_cache = Arc::clone(&cache);
        memory.register_reclaim_hook("message_cache", Box::new(move || hook_cache.purge_expired()));
        let hook_throttler = Arc::clone(&throttler);
        memory.register_reclaim_hook("throttle_windows", Box::new(move || hook_throttler.prune()));

        Self {
            batching: config.performance.batching.clone(),
            cache,
            throttler,
            batcher,
            memory,
            level: RwLock::new(level),
            counters: OptimizerCounters::default(),
        }
    }

    /// Per-user admission check.
    pub fn admit(
        &self,
        user_id: &UserId,
        role: Option<UserRole>,
        priority: NotificationPriority,
        ip: Option<&str>,
    ) -> ThrottleDecision {
        self.throttler.check(user_id, role, priority, ip)
    }

    /// Admission check for one recipient of a fan-out.
    pub fn admit_fanout(&self, priority: NotificationPriority) -> ThrottleDecision {
        self.throttler.check_global(priority)
    }

    /// Decide how a message for an online user is delivered.
    pub async fn optimize_message_delivery(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        message: &NotificationMessage,
    ) -> DeliveryPlan {
        self.counters.optimized.fetch_add(1, Ordering::Relaxed);

        if self.cache.get(&message.id, Some(user_id)).is_some() {
            self.counters.cache_short_circuits.fetch_add(1, Ordering::Relaxed);
            return DeliveryPlan::CacheHit;
        }

        let mut buf: Vec<u8> = self.memory.acquire(Vec::new);
        if serde_json::to_writer(&mut buf, message).is_ok() {
            self.counters
                .bytes_processed
                .fetch_add(buf.len() as u64, Ordering::Relaxed);
        }
        buf.clear();
        self.memory.release(buf);

        if self.batching.enabled && message.priority.can_batch() {
            self.batcher.enqueue(user_id, namespace, message.clone()).await;
            self.counters.batched.fetch_add(1, Ordering::Relaxed);
            return DeliveryPlan::Batched;
        }

        self.counters.direct.fetch_add(1, Ordering::Relaxed);
        DeliveryPlan::Direct
    }

    /// Remember a delivered message so repeats short-circuit.
    pub fn record_delivered(&self, user_id: &UserId, message: &NotificationMessage) {
        cache_delivered(&self.cache, user_id, message);
    }

    /// Retune cache size, batch limits and compression for `level`.
    pub fn set_level(&self, level: OptimizationLevel) {
        let tuning = self.batching.resolve(level);
        self.cache.resize(tuning.cache_scale);
        self.cache.set_compression_threshold(tuning.compression_threshold_bytes);
        self.batcher.retune(tuning);
        *self.level.write().unwrap_or_else(|e| e.into_inner()) = level;
        info!(
            %level,
            max_batch_size = tuning.max_batch_size,
            batch_timeout_ms = tuning.batch_timeout_ms,
            cache_scale = tuning.cache_scale,
            "Optimization level changed"
        );
    }

    pub fn level(&self) -> OptimizationLevel {
        *self.level.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Flush every pending batch.
    pub async fn flush(&self) -> usize {
        self.batcher.flush_all().await
    }

    /// Drop idle limiter windows and expired cache entries.
    pub fn prune(&self) -> usize {
        self.throttler.prune() + self.cache.purge_expired()
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    pub fn batcher(&self) -> &MessageBatcher {
        &self.batcher
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let c = &self.counters;
        PerformanceSnapshot {
            level: self.level(),
            messages_optimized: c.optimized.load(Ordering::Relaxed),
            cache_short_circuits: c.cache_short_circuits.load(Ordering::Relaxed),
            batched: c.batched.load(Ordering::Relaxed),
            direct: c.direct.load(Ordering::Relaxed),
            bytes_processed: c.bytes_processed.load(Ordering::Relaxed),
            cache: self.cache.stats(),
            throttle: self.throttler.stats(),
            batch: self.batcher.stats(),
            memory: self.memory.stats(),
        }
    }
}
