//! Batching, memory management and optimization-level settings.

use serde::{Deserialize, Serialize};

/// Preset that trades latency for throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    /// Small batches, long deadlines, compact cache.
    Conservative,
    /// Default trade-off.
    #[default]
    Balanced,
    /// Larger batches and cache.
    Aggressive,
    /// Largest batches, shortest deadlines, largest cache.
    Maximum,
}

/// Tuning values derived from an [`OptimizationLevel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelTuning {
    /// Members per batch before a size-triggered flush.
    pub max_batch_size: usize,
    /// Deadline after the first member before a time-triggered flush.
    pub batch_timeout_ms: u64,
    /// Multiplier applied to the configured cache capacity.
    pub cache_scale: f64,
    /// Batch payload size above which the batch is compressed.
    pub compression_threshold_bytes: usize,
}

impl OptimizationLevel {
    /// Tuning preset for this level.
    pub fn tuning(self) -> LevelTuning {
        match self {
            Self::Conservative => LevelTuning {
                max_batch_size: 25,
                batch_timeout_ms: 200,
                cache_scale: 0.5,
                compression_threshold_bytes: 4096,
            },
            Self::Balanced => LevelTuning {
                max_batch_size: 30,
                batch_timeout_ms: 100,
                cache_scale: 1.0,
                compression_threshold_bytes: 1024,
            },
            Self::Aggressive => LevelTuning {
                max_batch_size: 40,
                batch_timeout_ms: 75,
                cache_scale: 2.0,
                compression_threshold_bytes: 512,
            },
            Self::Maximum => LevelTuning {
                max_batch_size: 50,
                batch_timeout_ms: 50,
                cache_scale: 4.0,
                compression_threshold_bytes: 256,
            },
        }
    }

    /// Return the level as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
            Self::Maximum => "maximum",
        }
    }
}

impl std::fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Performance layer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Initial optimization level.
    #[serde(default)]
    pub level: OptimizationLevel,
    /// Batching settings.
    #[serde(default)]
    pub batching: BatchingConfig,
    /// Memory manager settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Outbound batching settings.
///
/// Unset numeric fields fall back to the optimization level preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Whether low/normal priority messages to online users are batched.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit batch size override.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
    /// Explicit batch timeout override in milliseconds.
    #[serde(default)]
    pub batch_timeout_ms: Option<u64>,
    /// Explicit compression threshold override in bytes.
    #[serde(default)]
    pub compression_threshold_bytes: Option<usize>,
    /// Include the priority in the batch key.
    #[serde(default)]
    pub group_by_priority: bool,
    /// Include the category in the batch key.
    #[serde(default)]
    pub group_by_category: bool,
}

impl BatchingConfig {
    /// Resolve effective values against a level preset.
    pub fn resolve(&self, level: OptimizationLevel) -> LevelTuning {
        let preset = level.tuning();
        LevelTuning {
            max_batch_size: self.max_batch_size.unwrap_or(preset.max_batch_size).max(1),
            batch_timeout_ms: self.batch_timeout_ms.unwrap_or(preset.batch_timeout_ms),
            cache_scale: preset.cache_scale,
            compression_threshold_bytes: self
                .compression_threshold_bytes
                .unwrap_or(preset.compression_threshold_bytes),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch_size: None,
            batch_timeout_ms: None,
            compression_threshold_bytes: None,
            group_by_priority: false,
            group_by_category: false,
        }
    }
}

/// Object pooling and memory pressure settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether the periodic memory check runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Memory budget in megabytes.
    #[serde(default = "default_max_memory")]
    pub max_memory_mb: u64,
    /// Fraction of the budget that triggers a reclamation pass.
    #[serde(default = "default_gc_threshold")]
    pub gc_threshold: f64,
    /// Fraction of the budget above which all pools are cleared.
    #[serde(default = "default_high_pressure")]
    pub high_pressure_ratio: f64,
    /// Maximum pooled objects per type.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    /// Interval between memory checks in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_memory_mb: default_max_memory(),
            gc_threshold: default_gc_threshold(),
            high_pressure_ratio: default_high_pressure(),
            pool_capacity: default_pool_capacity(),
            check_interval_seconds: default_check_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_memory() -> u64 {
    512
}

fn default_gc_threshold() -> f64 {
    0.8
}

fn default_high_pressure() -> f64 {
    0.8
}

fn default_pool_capacity() -> usize {
    100
}

fn default_check_interval() -> u64 {
    300
}
