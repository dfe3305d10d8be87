//! Memory budget enforcement.
//!
//! The manager pools short-lived objects and periodically compares the
//! process's resident size against `max_memory_mb × gc_threshold`. Crossing
//! the threshold runs every registered reclaim hook; above the high-pressure
//! ratio the pools are emptied as well.

pub mod pool;
pub mod probe;

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notifyhub_core::config::MemoryConfig;

pub use self::pool::ObjectPools;
pub use self::probe::{FixedProbe, MemoryProbe, ProcStatusProbe};

const MB: f64 = 1024.0 * 1024.0;

/// Something that can free memory on request, returning the items freed.
pub type ReclaimHook = Box<dyn Fn() -> usize + Send + Sync>;

/// Result of a usage check.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryUsage {
    pub current_mb: f64,
    pub budget_mb: u64,
    pub usage_ratio: f64,
    pub threshold_reached: bool,
}

/// Result of a cleanup pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanupStats {
    pub reclaimed_items: usize,
    pub pooled_objects_dropped: usize,
    pub hooks_run: usize,
    pub high_pressure: bool,
}

/// Point-in-time memory manager counters.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub usage: Option<MemoryUsage>,
    pub pooled_objects: usize,
    pub pool_hits: u64,
    pub pool_misses: u64,
    pub checks: u64,
    pub cleanups: u64,
}

/// Pools plus budget-driven reclamation.
pub struct MemoryManager {
    config: MemoryConfig,
    pools: ObjectPools,
    probe: Box<dyn MemoryProbe>,
    hooks: RwLock<Vec<(String, ReclaimHook)>>,
    pool_hits: AtomicU64,
    pool_misses: AtomicU64,
    checks: AtomicU64,
    cleanups: AtomicU64,
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("budget_mb", &self.config.max_memory_mb)
            .field("pooled", &self.pools.pooled())
            .finish_non_exhaustive()
    }
}

impl MemoryManager {
    /// Manager reading `VmRSS` from `/proc/self/status`.
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_probe(config, Box::new(ProcStatusProbe))
    }

    pub fn with_probe(config: MemoryConfig, probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            pools: ObjectPools::new(config.pool_capacity),
            config,
            probe,
            hooks: RwLock::new(Vec::new()),
            pool_hits: AtomicU64::new(0),
            pool_misses: AtomicU64::new(0),
            checks: AtomicU64::new(0),
            cleanups: AtomicU64::new(0),
        }
    }

    /// Register a hook run on every cleanup pass.
    pub fn register_reclaim_hook(&self, name: impl Into<String>, hook: ReclaimHook) {
        self.hooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.into(), hook));
    }

    /// Take a pooled object of type `T` or build a new one.
    pub fn acquire<T: Any + Send>(&self, factory: impl FnOnce() -> T) -> T {
        let (obj, reused) = self.pools.acquire(factory);
        let counter = if reused { &self.pool_hits } else { &self.pool_misses };
        counter.fetch_add(1, Ordering::Relaxed);
        obj
    }

    /// Return an object to its pool.
    pub fn release<T: Any + Send>(&self, obj: T) {
        self.pools.release(obj);
    }

    /// Compare resident memory with the budget.
    pub fn check_usage(&self) -> Option<MemoryUsage> {
        self.checks.fetch_add(1, Ordering::Relaxed);
        let bytes = self.probe.resident_bytes()?;
        let current_mb = bytes as f64 / MB;
        let budget = self.config.max_memory_mb.max(1) as f64;
        let usage_ratio = current_mb / budget;
        Some(MemoryUsage {
            current_mb,
            budget_mb: self.config.max_memory_mb,
            usage_ratio,
            threshold_reached: usage_ratio >= self.config.gc_threshold,
        })
    }

    /// Run reclaim hooks, emptying pools under high pressure.
    pub fn cleanup(&self) -> CleanupStats {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
        let high_pressure = self
            .check_usage()
            .is_some_and(|u| u.usage_ratio > self.config.high_pressure_ratio);

        let mut stats = CleanupStats {
            high_pressure,
            ..CleanupStats::default()
        };
        for (name, hook) in self.hooks.read().unwrap_or_else(|e| e.into_inner()).iter() {
            let freed = hook();
            debug!(hook = %name, freed, "Reclaim hook ran");
            stats.reclaimed_items += freed;
            stats.hooks_run += 1;
        }
        if high_pressure {
            stats.pooled_objects_dropped = self.pools.clear();
        }
        stats
    }

    /// Check usage and clean up when the threshold is crossed.
    pub fn check_and_cleanup(&self) -> Option<CleanupStats> {
        match self.check_usage() {
            Some(usage) if usage.threshold_reached => {
                warn!(
                    current_mb = usage.current_mb,
                    budget_mb = usage.budget_mb,
                    "Memory threshold reached, reclaiming"
                );
                let stats = self.cleanup();
                info!(
                    reclaimed = stats.reclaimed_items,
                    pooled_dropped = stats.pooled_objects_dropped,
                    "Memory cleanup completed"
                );
                Some(stats)
            }
            Some(_) => None,
            None => {
                debug!("Resident memory unavailable, skipping check");
                None
            }
        }
    }

    /// Spawn the periodic check, stopped by `cancel`.
    pub fn spawn_monitor(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }
        let manager = Arc::clone(self);
        let period = Duration::from_secs(self.config.check_interval_seconds.max(1));
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        manager.check_and_cleanup();
                    }
                }
            }
            debug!("Memory monitor stopped");
        }))
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            usage: self.probe.resident_bytes().map(|bytes| {
                let current_mb = bytes as f64 / MB;
                let usage_ratio = current_mb / self.config.max_memory_mb.max(1) as f64;
                MemoryUsage {
                    current_mb,
                    budget_mb: self.config.max_memory_mb,
                    usage_ratio,
                    threshold_reached: usage_ratio >= self.config.gc_threshold,
                }
            }),
            pooled_objects: self.pools.pooled(),
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            pool_misses: self.pool_misses.load(Ordering::Relaxed),
            checks: self.checks.load(Ordering::Relaxed),
            cleanups: self.cleanups.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn config() -> MemoryConfig {
        MemoryConfig {
            max_memory_mb: 100,
            ..MemoryConfig::default()
        }
    }

    #[test]
    fn test_below_threshold_does_nothing() {
        let manager = MemoryManager::with_probe(config(), Box::new(FixedProbe::new(50 * MIB)));
        let usage = manager.check_usage().unwrap();
        assert!(!usage.threshold_reached);
        assert!(manager.check_and_cleanup().is_none());
    }

    #[test]
    fn test_high_pressure_clears_pools_and_runs_hooks() {
        let manager = MemoryManager::with_probe(config(), Box::new(FixedProbe::new(90 * MIB)));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        manager.register_reclaim_hook(
            "counter",
            Box::new(move || {
                seen.fetch_add(1, Ordering::Relaxed);
                7
            }),
        );
        manager.release(Vec::<u8>::with_capacity(16));

        let stats = manager.check_and_cleanup().unwrap();
        assert!(stats.high_pressure);
        assert_eq!(stats.reclaimed_items, 7);
        assert_eq!(stats.pooled_objects_dropped, 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_pool_counters() {
        let manager = MemoryManager::with_probe(config(), Box::new(FixedProbe::new(0)));
        let buf: Vec<u8> = manager.acquire(Vec::new);
        manager.release(buf);
        let _buf: Vec<u8> = manager.acquire(Vec::new);
        let stats = manager.stats();
        assert_eq!(stats.pool_hits, 1);
        assert_eq!(stats.pool_misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_on_cancel() {
        let manager = Arc::new(MemoryManager::with_probe(
            MemoryConfig {
                check_interval_seconds: 1,
                ..config()
            },
            Box::new(FixedProbe::new(10 * MIB)),
        ));
        let cancel = CancellationToken::new();
        let handle = manager.spawn_monitor(cancel.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert!(manager.stats().checks >= 3);
    }
}
