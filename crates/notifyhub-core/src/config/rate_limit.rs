//! Throttling configuration.

use serde::{Deserialize, Serialize};

/// Per-user, global, IP and burst limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether throttling is applied at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-minute base limit for each role.
    #[serde(default)]
    pub by_role: RoleRateLimits,
    /// Per-user sliding window length in seconds.
    #[serde(default = "default_user_window")]
    pub user_window_seconds: u64,
    /// Multiplier applied to the per-user limit for HIGH priority messages.
    #[serde(default = "default_high_multiplier")]
    pub high_priority_multiplier: f64,
    /// Global token refill rate (tokens per second).
    #[serde(default = "default_global_rate")]
    pub max_global_rate: u32,
    /// Global token bucket capacity.
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,
    /// Global sliding window length in seconds.
    #[serde(default = "default_global_window")]
    pub global_window_seconds: u64,
    /// Fraction of the global window above which only HIGH/CRITICAL pass.
    #[serde(default = "default_backpressure")]
    pub backpressure_threshold: f64,
    /// Requests allowed per source address within the IP window.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: u32,
    /// IP sliding window length in seconds.
    #[serde(default = "default_ip_window")]
    pub ip_window_seconds: u64,
    /// Burst detection window in seconds.
    #[serde(default = "default_burst_window")]
    pub burst_window_seconds: u64,
    /// Requests within the burst window that flag a burst.
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: u32,
}

impl RateLimitConfig {
    /// Capacity of the global sliding window.
    pub fn global_window_capacity(&self) -> u64 {
        u64::from(self.max_global_rate) * self.global_window_seconds.max(1)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            by_role: RoleRateLimits::default(),
            user_window_seconds: default_user_window(),
            high_priority_multiplier: default_high_multiplier(),
            max_global_rate: default_global_rate(),
            burst_capacity: default_burst_capacity(),
            global_window_seconds: default_global_window(),
            backpressure_threshold: default_backpressure(),
            ip_limit: default_ip_limit(),
            ip_window_seconds: default_ip_window(),
            burst_window_seconds: default_burst_window(),
            burst_threshold: default_burst_threshold(),
        }
    }
}

/// Per-role base limits (messages per user window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRateLimits {
    /// Limit for administrators.
    #[serde(default = "default_admin_limit")]
    pub admin: u32,
    /// Limit for moderators.
    #[serde(default = "default_moderator_limit")]
    pub moderator: u32,
    /// Limit for reviewers.
    #[serde(default = "default_reviewer_limit")]
    pub reviewer: u32,
    /// Limit for viewers.
    #[serde(default = "default_viewer_limit")]
    pub viewer: u32,
}

impl RoleRateLimits {
    /// The most conservative configured limit, used for unknown roles.
    pub fn most_conservative(&self) -> u32 {
        self.admin
            .min(self.moderator)
            .min(self.reviewer)
            .min(self.viewer)
    }
}

impl Default for RoleRateLimits {
    fn default() -> Self {
        Self {
            admin: default_admin_limit(),
            moderator: default_moderator_limit(),
            reviewer: default_reviewer_limit(),
            viewer: default_viewer_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_user_window() -> u64 {
    60
}

fn default_high_multiplier() -> f64 {
    2.0
}

fn default_global_rate() -> u32 {
    500
}

fn default_burst_capacity() -> u32 {
    1000
}

fn default_global_window() -> u64 {
    1
}

fn default_backpressure() -> f64 {
    0.8
}

fn default_ip_limit() -> u32 {
    100
}

fn default_ip_window() -> u64 {
    3600
}

fn default_burst_window() -> u64 {
    10
}

fn default_burst_threshold() -> u32 {
    5
}

fn default_admin_limit() -> u32 {
    1000
}

fn default_moderator_limit() -> u32 {
    300
}

fn default_reviewer_limit() -> u32 {
    200
}

fn default_viewer_limit() -> u32 {
    100
}
