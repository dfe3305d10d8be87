//! Message cache configuration.

use serde::{Deserialize, Serialize};

/// Which entry is evicted when a cache tier is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used entry is evicted.
    #[default]
    Lru,
    /// Oldest inserted entry is evicted regardless of access.
    Fifo,
}

/// Two-tier message cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the cache is consulted at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum entries in the global tier.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Entry time-to-live in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Whether per-user tiers are maintained.
    #[serde(default = "default_true")]
    pub per_user_enabled: bool,
    /// Maximum entries in each per-user tier.
    #[serde(default = "default_per_user_entries")]
    pub per_user_max_entries: usize,
    /// Eviction policy for both tiers.
    #[serde(default)]
    pub eviction: EvictionPolicy,
    /// Whether large entries are stored compressed.
    #[serde(default = "default_true")]
    pub compression_enabled: bool,
    /// Serialized size above which entries are compressed.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl(),
            per_user_enabled: true,
            per_user_max_entries: default_per_user_entries(),
            eviction: EvictionPolicy::default(),
            compression_enabled: true,
            compression_threshold_bytes: default_compression_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    5000
}

fn default_ttl() -> u64 {
    3600
}

fn default_per_user_entries() -> usize {
    100
}

fn default_compression_threshold() -> usize {
    1024
}
