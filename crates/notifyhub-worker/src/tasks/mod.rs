//! Built-in maintenance tasks.

pub mod cleanup;
pub mod health;
pub mod prune;

pub use cleanup::NotificationCleanupTask;
pub use health::EngineHealthTask;
pub use prune::LimiterPruneTask;

/// Task names as scheduled.
pub const NOTIFICATION_CLEANUP: &str = "notification_cleanup";
pub const LIMITER_PRUNE: &str = "limiter_prune";
pub const ENGINE_HEALTH: &str = "engine_health";
