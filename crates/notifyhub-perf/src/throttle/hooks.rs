//! Pluggable anomaly policies evaluated after the built-in limits.

use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::{NotificationPriority, UserRole};

/// What a policy hook sees about a request.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleContext<'a> {
    pub user_id: &'a UserId,
    pub role: Option<UserRole>,
    pub priority: NotificationPriority,
    pub ip: Option<&'a str>,
    /// Requests by this user in the current per-user window, this one excluded.
    pub user_window_count: usize,
    /// Whether the burst detector flagged this request.
    pub burst_flagged: bool,
}

/// Verdict of a policy hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict {
    /// No opinion.
    Allow,
    /// Let the request through but log the finding.
    Flag(String),
    /// Reject the request.
    Deny(String),
}

/// Additional rate policy, such as anomaly scoring.
///
/// Hook errors fail open: the request is allowed and the error is logged.
pub trait RatePolicyHook: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Evaluate a request that passed every built-in limit.
    fn evaluate(&self, ctx: &ThrottleContext<'_>) -> AppResult<HookVerdict>;
}
