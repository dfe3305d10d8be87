//! Capacity-bounded map with LRU or FIFO eviction and TTL expiry.
//!
//! Eviction order is exact: every entry carries a monotonically increasing
//! tick and the `order` index maps ticks back to keys. Under LRU a read
//! re-ticks the entry; under FIFO only insertion does. Expired entries are
//! purged when touched or by [`BoundedStore::purge_expired`].

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

use notifyhub_core::config::EvictionPolicy;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    inserted_at: Instant,
    tick: u64,
}

/// Bounded key-value store.
#[derive(Debug)]
pub struct BoundedStore<K, V> {
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    next_tick: u64,
    capacity: usize,
    ttl: Duration,
    policy: EvictionPolicy,
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a store. A zero capacity is raised to one.
    pub fn new(capacity: usize, ttl: Duration, policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            capacity: capacity.max(1),
            ttl,
            policy,
        }
    }

    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn is_expired(&self, slot: &Slot<V>) -> bool {
        slot.inserted_at.elapsed() >= self.ttl
    }

    /// Fetch a live entry. Expired entries are removed and reported as misses.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let expired = self.is_expired(self.entries.get(key)?);
        if expired {
            self.remove(key);
            return None;
        }
        if self.policy == EvictionPolicy::Lru {
            let tick = self.tick();
            let slot = self.entries.get_mut(key)?;
            self.order.remove(&slot.tick);
            slot.tick = tick;
            self.order.insert(tick, key.clone());
        }
        self.entries.get(key).map(|slot| slot.value.clone())
    }

    /// Insert or replace an entry. Returns the number of evicted entries.
    pub fn put(&mut self, key: K, value: V) -> usize {
        self.remove(&key);
        let tick = self.tick();
        self.order.insert(tick, key.clone());
        self.entries.insert(
            key,
            Slot {
                value,
                inserted_at: Instant::now(),
                tick,
            },
        );
        self.evict_to(self.capacity)
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot.value)
    }

    /// Change the capacity, evicting down to it. Returns the evicted count.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        self.evict_to(self.capacity)
    }

    fn evict_to(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > capacity {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, slot)| self.is_expired(slot))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_lru_evicts_least_recently_read() {
        let mut store = BoundedStore::new(2, HOUR, EvictionPolicy::Lru);
        store.put("a", 1);
        store.put("b", 2);
        assert_eq!(store.get(&"a"), Some(1));
        assert_eq!(store.put("c", 3), 1);
        assert_eq!(store.get(&"b"), None);
        assert_eq!(store.get(&"a"), Some(1));
        assert_eq!(store.get(&"c"), Some(3));
    }

    #[tokio::test]
    async fn test_fifo_ignores_reads() {
        let mut store = BoundedStore::new(2, HOUR, EvictionPolicy::Fifo);
        store.put("a", 1);
        store.put("b", 2);
        assert_eq!(store.get(&"a"), Some(1));
        store.put("c", 3);
        assert_eq!(store.get(&"a"), None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_is_a_miss() {
        let mut store = BoundedStore::new(10, Duration::from_secs(60), EvictionPolicy::Lru);
        store.put("a", 1);
        store.put("b", 2);
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get(&"a"), Some(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get(&"a"), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_shrinking_capacity_evicts_oldest() {
        let mut store = BoundedStore::new(4, HOUR, EvictionPolicy::Lru);
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            store.put(key, i);
        }
        assert_eq!(store.set_capacity(2), 2);
        assert_eq!(store.get(&"a"), None);
        assert_eq!(store.get(&"d"), Some(3));
    }
}
