//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files and `NOTIFYHUB__*` environment variables. Every field has a
//! default, so an empty configuration yields a working in-memory engine.

pub mod app;
pub mod cache;
pub mod database;
pub mod logging;
pub mod notification;
pub mod performance;
pub mod rate_limit;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::cache::{CacheConfig, EvictionPolicy};
pub use self::database::{DatabaseConfig, StoreBackend};
pub use self::logging::LoggingConfig;
pub use self::notification::NotificationConfig;
pub use self::performance::{
    BatchingConfig, LevelTuning, MemoryConfig, OptimizationLevel, PerformanceConfig,
};
pub use self::rate_limit::{RateLimitConfig, RoleRateLimits};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Persistence settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Delivery, queueing and validation settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Throttling settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Message cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Batching, memory and optimization-level settings.
    #[serde(default)]
    pub performance: PerformanceConfig,
    /// Scheduled maintenance settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default`, the environment-specific overlay
    /// `config/{env}` and environment variables prefixed with `NOTIFYHUB`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NOTIFYHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.notifications.max_offline_messages == 0 {
            return Err(AppError::configuration(
                "notifications.max_offline_messages must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.rate_limit.backpressure_threshold) {
            return Err(AppError::configuration(
                "rate_limit.backpressure_threshold must be between 0.0 and 1.0",
            ));
        }
        if self.rate_limit.high_priority_multiplier < 1.0 {
            return Err(AppError::configuration(
                "rate_limit.high_priority_multiplier must be >= 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.performance.memory.gc_threshold) {
            return Err(AppError::configuration(
                "performance.memory.gc_threshold must be between 0.0 and 1.0",
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(AppError::configuration("cache.max_entries must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_uses_defaults() {
        let config: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.notifications.max_offline_messages, 100);
        assert_eq!(config.notifications.max_history_per_user, 50);
        assert_eq!(config.rate_limit.burst_threshold, 5);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.performance.level, OptimizationLevel::Balanced);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.rate_limit.backpressure_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            [notifications]
            max_offline_messages = 5

            [performance]
            level = "maximum"

            [cache]
            eviction = "fifo"
        "#;
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.notifications.max_offline_messages, 5);
        assert_eq!(config.performance.level, OptimizationLevel::Maximum);
        assert_eq!(config.cache.eviction, EvictionPolicy::Fifo);
    }
}
