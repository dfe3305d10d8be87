//! Outbound batching.
//!
//! Messages are grouped by [`BatchKey`]. A batch flushes when it reaches the
//! size limit or when the deadline armed by its first member passes. Each
//! key owns at most one timer task, aborted when the batch flushes early.
//! Batching is an optimization only: flush failures hand the members back
//! to the sink for retry queuing and are never retried here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use notifyhub_cache::codec;
use notifyhub_core::config::{BatchingConfig, LevelTuning};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::{Namespace, NotificationCategory, NotificationMessage, NotificationPriority};

/// Grouping key of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub user_id: UserId,
    pub namespace: Namespace,
    pub priority: Option<NotificationPriority>,
    pub category: Option<NotificationCategory>,
}

/// Deflated, base64-encoded JSON array of batch members.
#[derive(Debug, Clone, Serialize)]
pub struct CompressedBatch {
    pub count: usize,
    pub encoding: &'static str,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub data: String,
}

impl CompressedBatch {
    /// Compress a serialized member array.
    pub fn encode(members: &[NotificationMessage]) -> AppResult<Self> {
        let raw = serde_json::to_vec(members)?;
        let packed = codec::compress(&raw)?;
        Ok(Self {
            count: members.len(),
            encoding: "deflate+base64",
            original_bytes: raw.len(),
            compressed_bytes: packed.len(),
            data: STANDARD.encode(&packed),
        })
    }
}

/// Online delivery used when a batch flushes.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Deliver one member. `Ok(false)` means no session accepted it.
    async fn deliver_one(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        message: &NotificationMessage,
    ) -> AppResult<bool>;

    /// Deliver a compressed batch as a single frame.
    async fn deliver_compressed(
        &self,
        user_id: &UserId,
        namespace: Namespace,
        batch: &CompressedBatch,
        members: &[NotificationMessage],
    ) -> AppResult<bool>;

    /// Take back members whose delivery failed.
    async fn flush_failed(&self, user_id: &UserId, members: Vec<NotificationMessage>);
}

#[derive(Debug)]
struct PendingBatch {
    id: u64,
    members: Vec<NotificationMessage>,
    bytes: usize,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy)]
struct Tuning {
    max_batch_size: usize,
    timeout: Duration,
    compression_threshold: usize,
}

/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Size,
    Timeout,
    Drain,
}

#[derive(Debug, Default)]
struct BatchCounters {
    enqueued: AtomicU64,
    batches_flushed: AtomicU64,
    messages_flushed: AtomicU64,
    size_flushes: AtomicU64,
    timeout_flushes: AtomicU64,
    compressed_batches: AtomicU64,
    flush_failures: AtomicU64,
    bytes_saved: AtomicU64,
}

/// Point-in-time batch counters.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStats {
    pub enqueued: u64,
    pub batches_flushed: u64,
    pub messages_flushed: u64,
    pub size_flushes: u64,
    pub timeout_flushes: u64,
    pub compressed_batches: u64,
    pub flush_failures: u64,
    pub bytes_saved: u64,
    pub average_batch_size: f64,
    pub pending_batches: usize,
    pub pending_messages: usize,
}

struct BatcherInner {
    sink: Arc<dyn BatchSink>,
    pending: Mutex<HashMap<BatchKey, PendingBatch>>,
    tuning: Mutex<Tuning>,
    group_by_priority: bool,
    group_by_category: bool,
    next_id: AtomicU64,
    pending_messages: AtomicUsize,
    counters: BatchCounters,
}

/// Per-key batcher with deadline flushing.
#[derive(Clone)]
pub struct MessageBatcher {
    inner: Arc<BatcherInner>,
}

impl std::fmt::Debug for MessageBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBatcher")
            .field("pending_messages", &self.inner.pending_messages.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MessageBatcher {
    pub fn new(config: &BatchingConfig, tuning: LevelTuning, sink: Arc<dyn BatchSink>) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                sink,
                pending: Mutex::new(HashMap::new()),
                tuning: Mutex::new(Tuning::from(tuning)),
                group_by_priority: config.group_by_priority,
                group_by_category: config.group_by_category,
                next_id: AtomicU64::new(1),
                pending_messages: AtomicUsize::new(0),
                counters: BatchCounters::default(),
            }),
        }
    }

    /// Apply new size, deadline and compression settings to future batches.
    pub fn retune(&self, tuning: LevelTuning) {
        *self.inner.tuning.lock().unwrap_or_else(|e| e.into_inner()) = Tuning::from(tuning);
    }

    /// Key a message would be batched under.
    pub fn key_for(&self, user_id: &UserId, namespace: Namespace, message: &NotificationMessage) -> BatchKey {
        BatchKey {
            user_id: user_id.clone(),
            namespace,
            priority: self.inner.group_by_priority.then_some(message.priority),
            category: self.inner.group_by_category.then_some(message.category),
        }
    }

    /// Add a message to its batch, flushing immediately if the batch is full.
    pub async fn enqueue(&self, user_id: &UserId, namespace: Namespace, message: NotificationMessage) {
        let key = self.key_for(user_id, namespace, &message);
        let tuning = *self.inner.tuning.lock().unwrap_or_else(|e| e.into_inner());
        let size = message.estimated_size();
        self.inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.inner.pending_messages.fetch_add(1, Ordering::Relaxed);

        let full = {
            let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            let batch = pending.entry(key.clone()).or_insert_with(|| {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                PendingBatch {
                    id,
                    members: Vec::with_capacity(tuning.max_batch_size),
                    bytes: 0,
                    timer: None,
                }
            });
            batch.members.push(message);
            batch.bytes += size;

            if batch.members.len() >= tuning.max_batch_size {
                pending.remove(&key)
            } else {
                if batch.timer.is_none() {
                    batch.timer = Some(self.arm_timer(key.clone(), batch.id, tuning.timeout));
                }
                None
            }
        };

        if let Some(mut batch) = full {
            if let Some(timer) = batch.timer.take() {
                timer.abort();
            }
            self.inner.deliver(&key, batch, FlushTrigger::Size, tuning).await;
        }
    }

    /// Flush every pending batch now.
    pub async fn flush_all(&self) -> usize {
        let tuning = *self.inner.tuning.lock().unwrap_or_else(|e| e.into_inner());
        let drained: Vec<(BatchKey, PendingBatch)> = {
            let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().collect()
        };
        let count = drained.len();
        for (key, mut batch) in drained {
            if let Some(timer) = batch.timer.take() {
                timer.abort();
            }
            self.inner.deliver(&key, batch, FlushTrigger::Drain, tuning).await;
        }
        count
    }

    pub fn pending_messages(&self) -> usize {
        self.inner.pending_messages.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> BatchStats {
        let c = &self.inner.counters;
        let batches = c.batches_flushed.load(Ordering::Relaxed);
        let messages = c.messages_flushed.load(Ordering::Relaxed);
        BatchStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            batches_flushed: batches,
            messages_flushed: messages,
            size_flushes: c.size_flushes.load(Ordering::Relaxed),
            timeout_flushes: c.timeout_flushes.load(Ordering::Relaxed),
            compressed_batches: c.compressed_batches.load(Ordering::Relaxed),
            flush_failures: c.flush_failures.load(Ordering::Relaxed),
            bytes_saved: c.bytes_saved.load(Ordering::Relaxed),
            average_batch_size: if batches == 0 {
                0.0
            } else {
                messages as f64 / batches as f64
            },
            pending_batches: self.inner.pending.lock().unwrap_or_else(|e| e.into_inner()).len(),
            pending_messages: self.pending_messages(),
        }
    }

    fn arm_timer(&self, key: BatchKey, id: u64, timeout: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let batch = {
                let mut pending = inner.pending.lock().unwrap_or_else(|e| e.into_inner());
                if pending.get(&key).is_some_and(|batch| batch.id == id) {
                    pending.remove(&key)
                } else {
                    None
                }
            };
            if let Some(batch) = batch {
                let tuning = *inner.tuning.lock().unwrap_or_else(|e| e.into_inner());
                inner.deliver(&key, batch, FlushTrigger::Timeout, tuning).await;
            }
        })
    }
}

impl BatcherInner {
    async fn deliver(&self, key: &BatchKey, batch: PendingBatch, trigger: FlushTrigger, tuning: Tuning) {
        let members = batch.members;
        let count = members.len();
        self.pending_messages.fetch_sub(count, Ordering::Relaxed);
        self.counters.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.counters.messages_flushed.fetch_add(count as u64, Ordering::Relaxed);
        match trigger {
            FlushTrigger::Size => self.counters.size_flushes.fetch_add(1, Ordering::Relaxed),
            FlushTrigger::Timeout => self.counters.timeout_flushes.fetch_add(1, Ordering::Relaxed),
            FlushTrigger::Drain => 0,
        };
        debug!(user_id = %key.user_id, count, bytes = batch.bytes, ?trigger, "Flushing batch");

        if count > 1 && batch.bytes > tuning.compression_threshold {
            match CompressedBatch::encode(&members) {
                Ok(compressed) => {
                    self.counters.compressed_batches.fetch_add(1, Ordering::Relaxed);
                    self.counters.bytes_saved.fetch_add(
                        compressed.original_bytes.saturating_sub(compressed.data.len()) as u64,
                        Ordering::Relaxed,
                    );
                    match self
                        .sink
                        .deliver_compressed(&key.user_id, key.namespace, &compressed, &members)
                        .await
                    {
                        Ok(true) => return,
                        Ok(false) => {
                            warn!(user_id = %key.user_id, count, "Compressed batch not accepted");
                        }
                        Err(e) => {
                            error!(user_id = %key.user_id, count, error = %e, "Compressed batch delivery failed");
                        }
                    }
                    self.counters.flush_failures.fetch_add(1, Ordering::Relaxed);
                    self.sink.flush_failed(&key.user_id, members).await;
                    return;
                }
                Err(e) => {
                    warn!(user_id = %key.user_id, error = %e, "Batch compression failed, delivering individually");
                }
            }
        }

        let mut failed = Vec::new();
        for message in members {
            match self.sink.deliver_one(&key.user_id, key.namespace, &message).await {
                Ok(true) => {}
                Ok(false) => failed.push(message),
                Err(e) => {
                    error!(user_id = %key.user_id, message_id = %message.id, error = %e, "Batch member delivery failed");
                    failed.push(message);
                }
            }
        }
        if !failed.is_empty() {
            self.counters.flush_failures.fetch_add(1, Ordering::Relaxed);
            self.sink.flush_failed(&key.user_id, failed).await;
        }
    }
}

impl From<LevelTuning> for Tuning {
    fn from(t: LevelTuning) -> Self {
        Self {
            max_batch_size: t.max_batch_size.max(1),
            timeout: Duration::from_millis(t.batch_timeout_ms),
            compression_threshold: t.compression_threshold_bytes,
        }
    }
}
