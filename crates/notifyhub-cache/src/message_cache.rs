//! Two-tier cache of recently delivered messages.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use notifyhub_core::config::{CacheConfig, EvictionPolicy};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::NotificationMessage;

use crate::codec;
use crate::store::BoundedStore;

#[derive(Debug, Clone)]
enum CachedEntry {
    Plain(Arc<NotificationMessage>),
    Compressed(Arc<[u8]>),
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub puts: u64,
    pub evictions: u64,
    pub compressed_puts: u64,
    pub global_entries: usize,
    pub global_capacity: usize,
    pub user_tiers: usize,
}

/// Per-user tier checked before a shared global tier.
#[derive(Debug)]
pub struct MessageCache {
    enabled: bool,
    global: Mutex<BoundedStore<NotificationId, CachedEntry>>,
    per_user: Option<DashMap<UserId, BoundedStore<NotificationId, CachedEntry>>>,
    per_user_capacity: usize,
    base_capacity: usize,
    ttl: Duration,
    policy: EvictionPolicy,
    compression_enabled: bool,
    compression_threshold: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    evictions: AtomicU64,
    compressed_puts: AtomicU64,
}

impl MessageCache {
    /// Build a cache whose global tier holds `max_entries × scale` entries.
    pub fn new(config: &CacheConfig, scale: f64) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);
        let capacity = scaled(config.max_entries, scale);
        Self {
            enabled: config.enabled,
            global: Mutex::new(BoundedStore::new(capacity, ttl, config.eviction)),
            per_user: config.per_user_enabled.then(DashMap::new),
            per_user_capacity: config.per_user_max_entries.max(1),
            base_capacity: config.max_entries,
            ttl,
            policy: config.eviction,
            compression_enabled: config.compression_enabled,
            compression_threshold: AtomicUsize::new(config.compression_threshold_bytes),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            compressed_puts: AtomicU64::new(0),
        }
    }

    /// Whether the cache accepts entries.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look a message up, per-user tier first when a user is given.
    pub fn get(&self, id: &NotificationId, user_id: Option<&UserId>) -> Option<NotificationMessage> {
        if !self.enabled {
            return None;
        }

        let mut entry = None;
        if let (Some(user), Some(tiers)) = (user_id, &self.per_user) {
            entry = tiers.get_mut(user).and_then(|mut tier| tier.get(id));
        }
        if entry.is_none() {
            entry = self.global.lock().unwrap_or_else(|e| e.into_inner()).get(id);
        }

        match entry.map(|e| self.decode(&e)) {
            Some(Ok(message)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(message)
            }
            Some(Err(e)) => {
                warn!(message_id = %id, error = %e, "Dropping undecodable cache entry");
                self.invalidate(id, user_id);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cache a message in the global tier and, when given, the user's tier.
    pub fn put(&self, message: &NotificationMessage, user_id: Option<&UserId>) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = self.encode(message)?;
        let mut evicted = self
            .global
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(message.id.clone(), entry.clone());

        if let (Some(user), Some(tiers)) = (user_id, &self.per_user) {
            evicted += tiers
                .entry(user.clone())
                .or_insert_with(|| BoundedStore::new(self.per_user_capacity, self.ttl, self.policy))
                .put(message.id.clone(), entry);
        }

        self.puts.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Drop a message from the global tier and, when given, the user's tier.
    pub fn invalidate(&self, id: &NotificationId, user_id: Option<&UserId>) {
        self.global.lock().unwrap_or_else(|e| e.into_inner()).remove(id);
        if let (Some(user), Some(tiers)) = (user_id, &self.per_user) {
            if let Some(mut tier) = tiers.get_mut(user) {
                tier.remove(id);
            }
        }
    }

    /// Rescale the global tier against the configured base capacity.
    pub fn resize(&self, scale: f64) {
        let capacity = scaled(self.base_capacity, scale);
        let evicted = self
            .global
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_capacity(capacity);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        debug!(capacity, evicted, "Resized message cache");
    }

    /// Entries whose serialized size exceeds this are stored compressed.
    pub fn set_compression_threshold(&self, bytes: usize) {
        self.compression_threshold.store(bytes, Ordering::Relaxed);
    }

    /// Purge expired entries from every tier and drop empty user tiers.
    pub fn purge_expired(&self) -> usize {
        let mut removed = self
            .global
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .purge_expired();
        if let Some(tiers) = &self.per_user {
            for mut tier in tiers.iter_mut() {
                removed += tier.purge_expired();
            }
            tiers.retain(|_, tier| !tier.is_empty());
        }
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.global.lock().unwrap_or_else(|e| e.into_inner()).clear();
        if let Some(tiers) = &self.per_user {
            tiers.clear();
        }
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let (global_entries, global_capacity) = {
            let global = self.global.lock().unwrap_or_else(|e| e.into_inner());
            (global.len(), global.capacity())
        };
        CacheStats {
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            puts: self.puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            compressed_puts: self.compressed_puts.load(Ordering::Relaxed),
            global_entries,
            global_capacity,
            user_tiers: self.per_user.as_ref().map_or(0, |t| t.len()),
        }
    }

    fn encode(&self, message: &NotificationMessage) -> AppResult<CachedEntry> {
        if !self.compression_enabled {
            return Ok(CachedEntry::Plain(Arc::new(message.clone())));
        }
        let raw = serde_json::to_vec(message)?;
        if raw.len() <= self.compression_threshold.load(Ordering::Relaxed) {
            return Ok(CachedEntry::Plain(Arc::new(message.clone())));
        }
        let packed = codec::compress(&raw)?;
        self.compressed_puts.fetch_add(1, Ordering::Relaxed);
        Ok(CachedEntry::Compressed(packed.into()))
    }

    fn decode(&self, entry: &CachedEntry) -> AppResult<NotificationMessage> {
        match entry {
            CachedEntry::Plain(message) => Ok(message.as_ref().clone()),
            CachedEntry::Compressed(bytes) => {
                let raw = codec::decompress(bytes)?;
                Ok(serde_json::from_slice(&raw)?)
            }
        }
    }
}

fn scaled(base: usize, scale: f64) -> usize {
    ((base as f64) * scale).round().max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use notifyhub_entity::{NotificationCategory, NotificationKind};

    use super::*;

    fn config() -> CacheConfig {
        CacheConfig {
            max_entries: 4,
            per_user_max_entries: 2,
            ttl_seconds: 60,
            compression_threshold_bytes: 256,
            ..CacheConfig::default()
        }
    }

    fn message(id: &str, body: &str) -> NotificationMessage {
        NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, "Title", body)
            .with_id(id)
            .for_user("alice")
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = MessageCache::new(&config(), 1.0);
        let user = UserId::new("alice");
        let msg = message("m-1", "short");
        cache.put(&msg, Some(&user)).unwrap();

        assert_eq!(cache.get(&msg.id, Some(&user)), Some(msg.clone()));
        assert_eq!(cache.get(&msg.id, None), Some(msg));
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn test_large_entries_roundtrip_compressed() {
        let cache = MessageCache::new(&config(), 1.0);
        let msg = message("m-big", &"disk usage report ".repeat(100));
        cache.put(&msg, None).unwrap();

        assert_eq!(cache.stats().compressed_puts, 1);
        assert_eq!(cache.get(&msg.id, None), Some(msg));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_misses() {
        let cache = MessageCache::new(&config(), 1.0);
        let user = UserId::new("alice");
        let msg = message("m-1", &"x".repeat(1000));
        cache.put(&msg, Some(&user)).unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&msg.id, Some(&user)), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_user_tier_is_bounded_independently() {
        let cache = MessageCache::new(&config(), 1.0);
        let user = UserId::new("alice");
        for i in 0..3 {
            cache.put(&message(&format!("m-{i}"), "b"), Some(&user)).unwrap();
        }
        // Evicted from the user tier but still in the global tier.
        assert!(cache.get(&NotificationId::new("m-0"), Some(&user)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_resize_and_invalidate() {
        let cache = MessageCache::new(&config(), 1.0);
        for i in 0..4 {
            cache.put(&message(&format!("m-{i}"), "b"), None).unwrap();
        }
        cache.resize(0.5);
        assert_eq!(cache.stats().global_capacity, 2);
        assert_eq!(cache.stats().global_entries, 2);

        cache.invalidate(&NotificationId::new("m-3"), None);
        assert_eq!(cache.get(&NotificationId::new("m-3"), None), None);
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let cache = MessageCache::new(
            &CacheConfig {
                enabled: false,
                ..config()
            },
            1.0,
        );
        let msg = message("m-1", "b");
        cache.put(&msg, None).unwrap();
        assert_eq!(cache.get(&msg.id, None), None);
        assert_eq!(cache.stats().misses, 0);
    }
}
