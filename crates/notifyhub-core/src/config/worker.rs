//! Scheduled maintenance configuration.

use serde::{Deserialize, Serialize};

/// Cron schedules for background maintenance (six-field, seconds first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Expired/retention cleanup schedule.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
    /// Limiter, dedup, tracker and cache pruning schedule.
    #[serde(default = "default_prune_cron")]
    pub prune_cron: String,
    /// Health check and statistics logging schedule.
    #[serde(default = "default_health_cron")]
    pub health_cron: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_cron: default_cleanup_cron(),
            prune_cron: default_prune_cron(),
            health_cron: default_health_cron(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cleanup_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_prune_cron() -> String {
    "0 */5 * * * *".to_string()
}

fn default_health_cron() -> String {
    "0 * * * * *".to_string()
}
