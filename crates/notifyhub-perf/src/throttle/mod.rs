//! Adaptive rate limiting.
//!
//! Checks run in a fixed order: burst flagging (never blocks), critical
//! bypass, backpressure, global window saturation, the per-user window
//! scaled by priority, the per-IP window, policy hooks, and finally the
//! global token bucket. Only admitted requests are counted; a window slot
//! is reserved when its check passes and released if a later check rejects.

pub mod bucket;
pub mod burst;
pub mod hooks;
pub mod window;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use notifyhub_core::config::RateLimitConfig;
use notifyhub_core::types::UserId;
use notifyhub_entity::{NotificationPriority, UserRole};

use self::bucket::TokenBucket;
use self::burst::BurstDetector;
use self::hooks::{HookVerdict, RatePolicyHook, ThrottleContext};
use self::window::SlidingWindow;

/// Why a request was throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitReason {
    /// Global load is above the backpressure threshold.
    Backpressure,
    /// The global window is full.
    GlobalSaturated,
    /// The global token bucket is empty.
    GlobalTokens,
    /// The user's per-minute allowance is used up.
    UserWindow,
    /// The source IP's allowance is used up.
    IpWindow,
    /// A policy hook denied the request.
    Policy,
}

impl RateLimitReason {
    /// Whether the caller should deflect the message to offline queuing
    /// instead of dropping it.
    pub fn is_deflectable(&self) -> bool {
        matches!(self, Self::Backpressure)
    }
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Backpressure => "backpressure",
            Self::GlobalSaturated => "global_saturated",
            Self::GlobalTokens => "global_tokens",
            Self::UserWindow => "user_window",
            Self::IpWindow => "ip_window",
            Self::Policy => "policy",
        };
        f.write_str(s)
    }
}

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allow,
    Reject(RateLimitReason),
}

impl ThrottleDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug)]
struct GlobalState {
    window: SlidingWindow,
    bucket: TokenBucket,
}

#[derive(Debug, Default)]
struct ThrottleCounters {
    checked: AtomicU64,
    allowed: AtomicU64,
    critical_bypass: AtomicU64,
    bursts_flagged: AtomicU64,
    hook_failures: AtomicU64,
    backpressure: AtomicU64,
    global_saturated: AtomicU64,
    global_tokens: AtomicU64,
    user_window: AtomicU64,
    ip_window: AtomicU64,
    policy: AtomicU64,
}

impl ThrottleCounters {
    fn rejected(&self, reason: RateLimitReason) {
        let counter = match reason {
            RateLimitReason::Backpressure => &self.backpressure,
            RateLimitReason::GlobalSaturated => &self.global_saturated,
            RateLimitReason::GlobalTokens => &self.global_tokens,
            RateLimitReason::UserWindow => &self.user_window,
            RateLimitReason::IpWindow => &self.ip_window,
            RateLimitReason::Policy => &self.policy,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time throttle counters.
#[derive(Debug, Clone, Serialize)]
pub struct ThrottleStats {
    pub checked: u64,
    pub allowed: u64,
    pub rejected: u64,
    pub throttle_rate: f64,
    pub critical_bypass: u64,
    pub bursts_flagged: u64,
    pub hook_failures: u64,
    pub rejected_backpressure: u64,
    pub rejected_global: u64,
    pub rejected_user_window: u64,
    pub rejected_ip_window: u64,
    pub rejected_policy: u64,
    pub global_utilization: f64,
    pub tracked_users: usize,
    pub tracked_ips: usize,
}

/// Per-user, per-IP and global limiter.
pub struct Throttler {
    config: RateLimitConfig,
    user_windows: DashMap<UserId, SlidingWindow>,
    ip_windows: DashMap<String, SlidingWindow>,
    bursts: BurstDetector,
    global: Mutex<GlobalState>,
    hooks: RwLock<Vec<Arc<dyn RatePolicyHook>>>,
    counters: ThrottleCounters,
}

impl std::fmt::Debug for Throttler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("enabled", &self.config.enabled)
            .field("tracked_users", &self.user_windows.len())
            .finish_non_exhaustive()
    }
}

impl Throttler {
    pub fn new(config: RateLimitConfig) -> Self {
        let now = Instant::now();
        let global = GlobalState {
            window: SlidingWindow::new(Duration::from_secs(config.global_window_seconds.max(1))),
            bucket: TokenBucket::new(config.burst_capacity, config.max_global_rate, now),
        };
        Self {
            bursts: BurstDetector::new(
                Duration::from_secs(config.burst_window_seconds),
                config.burst_threshold,
            ),
            user_windows: DashMap::new(),
            ip_windows: DashMap::new(),
            global: Mutex::new(global),
            hooks: RwLock::new(Vec::new()),
            counters: ThrottleCounters::default(),
            config,
        }
    }

    /// Register an additional policy hook.
    pub fn add_hook(&self, hook: Arc<dyn RatePolicyHook>) {
        self.hooks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(hook);
    }

    /// Base per-window allowance for a role; unknown roles get the most
    /// conservative allowance.
    pub fn base_limit(&self, role: Option<UserRole>) -> u32 {
        let limits = &self.config.by_role;
        match role {
            Some(UserRole::Admin) => limits.admin,
            Some(UserRole::Moderator) => limits.moderator,
            Some(UserRole::Reviewer) => limits.reviewer,
            Some(UserRole::Viewer) => limits.viewer,
            None => limits.most_conservative(),
        }
    }

    /// Effective allowance once the priority multiplier is applied.
    pub fn effective_limit(&self, role: Option<UserRole>, priority: NotificationPriority) -> usize {
        let base = self.base_limit(role) as f64;
        let scaled = if priority >= NotificationPriority::High {
            base * self.config.high_priority_multiplier
        } else {
            base
        };
        scaled.floor() as usize
    }

    /// Check and, when allowed, count one request.
    pub fn check(
        &self,
        user_id: &UserId,
        role: Option<UserRole>,
        priority: NotificationPriority,
        ip: Option<&str>,
    ) -> ThrottleDecision {
        if !self.config.enabled {
            return ThrottleDecision::Allow;
        }
        let now = Instant::now();
        self.counters.checked.fetch_add(1, Ordering::Relaxed);

        let burst_flagged = self.bursts.record(user_id, now);
        if burst_flagged {
            self.counters.bursts_flagged.fetch_add(1, Ordering::Relaxed);
            warn!(user_id = %user_id, priority = %priority, "Notification burst detected");
        }

        if priority == NotificationPriority::Critical {
            self.user_window(user_id).record(now);
            if let Some(ip) = ip {
                self.ip_window(ip).record(now);
            }
            self.global_force(now);
            self.counters.critical_bypass.fetch_add(1, Ordering::Relaxed);
            self.counters.allowed.fetch_add(1, Ordering::Relaxed);
            return ThrottleDecision::Allow;
        }

        if let Err(reason) = self.global_precheck(priority, now) {
            return self.reject(user_id, reason);
        }

        // Each window is checked and reserved under its own guard; later
        // rejections release the reservations made so far.
        let limit = self.effective_limit(role, priority);
        let user_window_count = {
            let mut window = self.user_window(user_id);
            let count = window.count(now);
            if !window.try_record(limit, now) {
                drop(window);
                return self.reject(user_id, RateLimitReason::UserWindow);
            }
            count
        };

        if let Some(ip) = ip {
            let reserved = self.ip_window(ip).try_record(self.config.ip_limit as usize, now);
            if !reserved {
                self.release_user(user_id, now);
                return self.reject(user_id, RateLimitReason::IpWindow);
            }
        }

        let ctx = ThrottleContext {
            user_id,
            role,
            priority,
            ip,
            user_window_count,
            burst_flagged,
        };
        let verdict = match self.run_hooks(&ctx) {
            Some(reason) => {
                debug!(user_id = %user_id, %reason, "Policy hook denied notification");
                Err(RateLimitReason::Policy)
            }
            None => self.global_admit(priority, now),
        };
        if let Err(reason) = verdict {
            self.release_user(user_id, now);
            if let Some(ip) = ip {
                self.release_ip(ip, now);
            }
            return self.reject(user_id, reason);
        }

        self.counters.allowed.fetch_add(1, Ordering::Relaxed);
        ThrottleDecision::Allow
    }

    /// Global-only check used for each recipient of a fan-out.
    pub fn check_global(&self, priority: NotificationPriority) -> ThrottleDecision {
        if !self.config.enabled {
            return ThrottleDecision::Allow;
        }
        let now = Instant::now();
        self.counters.checked.fetch_add(1, Ordering::Relaxed);

        if priority == NotificationPriority::Critical {
            self.global_force(now);
            self.counters.critical_bypass.fetch_add(1, Ordering::Relaxed);
            self.counters.allowed.fetch_add(1, Ordering::Relaxed);
            return ThrottleDecision::Allow;
        }
        if let Err(reason) = self.global_admit(priority, now) {
            self.counters.rejected(reason);
            return ThrottleDecision::Reject(reason);
        }
        self.counters.allowed.fetch_add(1, Ordering::Relaxed);
        ThrottleDecision::Allow
    }

    /// Fraction of the global window currently used.
    pub fn global_utilization(&self) -> f64 {
        let now = Instant::now();
        let mut global = self.global.lock().unwrap_or_else(|e| e.into_inner());
        utilization(global.window.count(now), self.config.global_window_capacity())
    }

    /// Drop idle per-user, per-IP and burst windows.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.user_windows.len() + self.ip_windows.len();
        self.user_windows.retain(|_, w| !w.is_idle(now));
        self.ip_windows.retain(|_, w| !w.is_idle(now));
        let removed = before - (self.user_windows.len() + self.ip_windows.len());
        removed + self.bursts.prune(now)
    }

    pub fn stats(&self) -> ThrottleStats {
        let c = &self.counters;
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        let checked = load(&c.checked);
        let allowed = load(&c.allowed);
        let rejected = checked.saturating_sub(allowed);
        ThrottleStats {
            checked,
            allowed,
            rejected,
            throttle_rate: if checked == 0 {
                0.0
            } else {
                rejected as f64 / checked as f64
            },
            critical_bypass: load(&c.critical_bypass),
            bursts_flagged: load(&c.bursts_flagged),
            hook_failures: load(&c.hook_failures),
            rejected_backpressure: load(&c.backpressure),
            rejected_global: load(&c.global_saturated) + load(&c.global_tokens),
            rejected_user_window: load(&c.user_window),
            rejected_ip_window: load(&c.ip_window),
            rejected_policy: load(&c.policy),
            global_utilization: self.global_utilization(),
            tracked_users: self.user_windows.len(),
            tracked_ips: self.ip_windows.len(),
        }
    }

    fn user_window(&self, user_id: &UserId) -> dashmap::mapref::one::RefMut<'_, UserId, SlidingWindow> {
        let span = Duration::from_secs(self.config.user_window_seconds.max(1));
        self.user_windows
            .entry(user_id.clone())
            .or_insert_with(|| SlidingWindow::new(span))
    }

    fn ip_window(&self, ip: &str) -> dashmap::mapref::one::RefMut<'_, String, SlidingWindow> {
        let span = Duration::from_secs(self.config.ip_window_seconds.max(1));
        self.ip_windows
            .entry(ip.to_string())
            .or_insert_with(|| SlidingWindow::new(span))
    }

    fn release_user(&self, user_id: &UserId, at: Instant) {
        if let Some(mut window) = self.user_windows.get_mut(user_id) {
            window.release(at);
        }
    }

    fn release_ip(&self, ip: &str, at: Instant) {
        if let Some(mut window) = self.ip_windows.get_mut(ip) {
            window.release(at);
        }
    }

    fn global_precheck(&self, priority: NotificationPriority, now: Instant) -> Result<(), RateLimitReason> {
        let mut global = self.global.lock().unwrap_or_else(|e| e.into_inner());
        self.global_limits(&mut global, priority, now)
    }

    /// Check backpressure, saturation and the token bucket, then count the
    /// request, all under one acquisition of the global lock.
    fn global_admit(&self, priority: NotificationPriority, now: Instant) -> Result<(), RateLimitReason> {
        let mut global = self.global.lock().unwrap_or_else(|e| e.into_inner());
        self.global_limits(&mut global, priority, now)?;
        if !global.bucket.try_take(now) {
            return Err(RateLimitReason::GlobalTokens);
        }
        global.window.record(now);
        Ok(())
    }

    fn global_limits(
        &self,
        global: &mut GlobalState,
        priority: NotificationPriority,
        now: Instant,
    ) -> Result<(), RateLimitReason> {
        let capacity = self.config.global_window_capacity();
        let count = global.window.count(now);
        let load = utilization(count, capacity);
        if load > self.config.backpressure_threshold && !priority.passes_backpressure() {
            return Err(RateLimitReason::Backpressure);
        }
        if count as u64 >= capacity {
            return Err(RateLimitReason::GlobalSaturated);
        }
        Ok(())
    }

    fn global_force(&self, now: Instant) {
        let mut global = self.global.lock().unwrap_or_else(|e| e.into_inner());
        global.bucket.force_take(now);
        global.window.record(now);
    }

    fn run_hooks(&self, ctx: &ThrottleContext<'_>) -> Option<String> {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        for hook in hooks.iter() {
            match hook.evaluate(ctx) {
                Ok(HookVerdict::Allow) => {}
                Ok(HookVerdict::Flag(note)) => {
                    warn!(user_id = %ctx.user_id, hook = hook.name(), note = %note, "Rate policy flagged notification");
                }
                Ok(HookVerdict::Deny(reason)) => return Some(reason),
                Err(e) => {
                    self.counters.hook_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(hook = hook.name(), error = %e, "Rate policy hook failed, allowing request");
                }
            }
        }
        None
    }

    fn reject(&self, user_id: &UserId, reason: RateLimitReason) -> ThrottleDecision {
        self.counters.rejected(reason);
        warn!(user_id = %user_id, %reason, "Notification rate limited");
        ThrottleDecision::Reject(reason)
    }
}

fn utilization(count: usize, capacity: u64) -> f64 {
    if capacity == 0 {
        return 1.0;
    }
    count as f64 / capacity as f64
}

#[cfg(test)]
mod tests {
    use notifyhub_core::error::AppError;
    use notifyhub_core::result::AppResult;

    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig {
            burst_threshold: 1000,
            ..RateLimitConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_limit_normal_messages_per_window() {
        let throttler = Throttler::new(config());
        let user = UserId::new("viewer-1");
        let limit = throttler.base_limit(Some(UserRole::Viewer));

        for _ in 0..limit {
            assert!(throttler
                .check(&user, Some(UserRole::Viewer), NotificationPriority::Normal, None)
                .is_allowed());
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(
            throttler.check(&user, Some(UserRole::Viewer), NotificationPriority::Normal, None),
            ThrottleDecision::Reject(RateLimitReason::UserWindow)
        );
        assert!(throttler
            .check(&user, Some(UserRole::Viewer), NotificationPriority::Critical, None)
            .is_allowed());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(throttler
            .check(&user, Some(UserRole::Viewer), NotificationPriority::Normal, None)
            .is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_gets_multiplied_allowance() {
        let throttler = Throttler::new(RateLimitConfig {
            by_role: notifyhub_core::config::RoleRateLimits {
                viewer: 2,
                ..Default::default()
            },
            ..config()
        });
        let user = UserId::new("v");
        let role = Some(UserRole::Viewer);
        assert_eq!(throttler.effective_limit(role, NotificationPriority::High), 4);
        for _ in 0..2 {
            assert!(throttler.check(&user, role, NotificationPriority::Normal, None).is_allowed());
        }
        assert!(!throttler.check(&user, role, NotificationPriority::Normal, None).is_allowed());
        assert!(throttler.check(&user, role, NotificationPriority::High, None).is_allowed());
        assert!(throttler.check(&user, role, NotificationPriority::High, None).is_allowed());
        assert!(!throttler.check(&user, role, NotificationPriority::High, None).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_role_uses_most_conservative_limit() {
        let throttler = Throttler::new(config());
        assert_eq!(throttler.base_limit(None), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backpressure_admits_only_urgent() {
        let throttler = Throttler::new(RateLimitConfig {
            max_global_rate: 100,
            ..config()
        });
        let admin = UserId::new("admin");
        for _ in 0..81 {
            assert!(throttler
                .check(&admin, Some(UserRole::Admin), NotificationPriority::Normal, None)
                .is_allowed());
        }
        assert!((throttler.global_utilization() - 0.81).abs() < 1e-9);
        assert_eq!(
            throttler.check(&admin, Some(UserRole::Admin), NotificationPriority::Normal, None),
            ThrottleDecision::Reject(RateLimitReason::Backpressure)
        );
        assert!(throttler
            .check(&admin, Some(UserRole::Admin), NotificationPriority::Critical, None)
            .is_allowed());
        assert!(throttler
            .check(&admin, Some(UserRole::Admin), NotificationPriority::High, None)
            .is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_window_is_independent_of_user() {
        let throttler = Throttler::new(RateLimitConfig {
            ip_limit: 2,
            ..config()
        });
        let role = Some(UserRole::Admin);
        let ip = Some("10.0.0.7");
        assert!(throttler.check(&UserId::new("a"), role, NotificationPriority::Normal, ip).is_allowed());
        assert!(throttler.check(&UserId::new("b"), role, NotificationPriority::Normal, ip).is_allowed());
        assert_eq!(
            throttler.check(&UserId::new("c"), role, NotificationPriority::Normal, ip),
            ThrottleDecision::Reject(RateLimitReason::IpWindow)
        );
        assert!(throttler.check(&UserId::new("c"), role, NotificationPriority::Normal, None).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_flagged_not_blocked() {
        let throttler = Throttler::new(RateLimitConfig {
            burst_threshold: 5,
            ..RateLimitConfig::default()
        });
        let user = UserId::new("u");
        for _ in 0..7 {
            assert!(throttler
                .check(&user, Some(UserRole::Admin), NotificationPriority::Normal, None)
                .is_allowed());
        }
        assert_eq!(throttler.stats().bursts_flagged, 2);
    }

    struct FailingHook;

    impl RatePolicyHook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, _ctx: &ThrottleContext<'_>) -> AppResult<HookVerdict> {
            Err(AppError::internal("scoring model unavailable"))
        }
    }

    struct DenyViewers;

    impl RatePolicyHook for DenyViewers {
        fn name(&self) -> &str {
            "deny-viewers"
        }

        fn evaluate(&self, ctx: &ThrottleContext<'_>) -> AppResult<HookVerdict> {
            Ok(match ctx.role {
                Some(UserRole::Viewer) => HookVerdict::Deny("viewer blocked".into()),
                _ => HookVerdict::Allow,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hooks_fail_open_and_can_deny() {
        let throttler = Throttler::new(config());
        throttler.add_hook(Arc::new(FailingHook));
        throttler.add_hook(Arc::new(DenyViewers));

        let user = UserId::new("u");
        assert!(throttler.check(&user, Some(UserRole::Admin), NotificationPriority::Normal, None).is_allowed());
        assert_eq!(
            throttler.check(&user, Some(UserRole::Viewer), NotificationPriority::Normal, None),
            ThrottleDecision::Reject(RateLimitReason::Policy)
        );
        assert_eq!(throttler.stats().hook_failures, 2);
    }

    #[test]
    fn test_parallel_callers_never_exceed_user_limit() {
        let throttler = Throttler::new(config());
        let user = UserId::new("viewer-shared");
        let role = Some(UserRole::Viewer);
        let limit = throttler.effective_limit(role, NotificationPriority::Normal);
        let barrier = std::sync::Barrier::new(16);
        let (throttler_ref, user_ref, barrier_ref) = (&throttler, &user, &barrier);

        let allowed: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(move |_| {
                    scope.spawn(move || {
                        let (throttler, user, barrier) = (throttler_ref, user_ref, barrier_ref);
                        barrier.wait();
                        (0..25)
                            .filter(|_| {
                                throttler
                                    .check(user, role, NotificationPriority::Normal, None)
                                    .is_allowed()
                            })
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, limit);
        assert_eq!(throttler.stats().rejected_user_window, (16 * 25 - limit) as u64);
    }

    #[test]
    fn test_parallel_fan_out_respects_backpressure() {
        let throttler = Throttler::new(RateLimitConfig {
            max_global_rate: 10,
            global_window_seconds: 60,
            ..config()
        });
        let barrier = std::sync::Barrier::new(8);
        let (throttler_ref, barrier_ref) = (&throttler, &barrier);

        let allowed: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(move |_| {
                    scope.spawn(move || {
                        let (throttler, barrier) = (throttler_ref, barrier_ref);
                        barrier.wait();
                        (0..100)
                            .filter(|_| throttler.check_global(NotificationPriority::Normal).is_allowed())
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        // 600 slots; admission stops once load exceeds 80%.
        assert_eq!(allowed, 481);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_rejection_releases_user_slot() {
        let throttler = Throttler::new(RateLimitConfig {
            ip_limit: 1,
            by_role: notifyhub_core::config::RoleRateLimits {
                viewer: 1,
                ..Default::default()
            },
            ..config()
        });
        let user = UserId::new("v");
        let role = Some(UserRole::Viewer);
        assert!(throttler.check(&UserId::new("other"), role, NotificationPriority::Normal, Some("10.0.0.1")).is_allowed());
        assert_eq!(
            throttler.check(&user, role, NotificationPriority::Normal, Some("10.0.0.1")),
            ThrottleDecision::Reject(RateLimitReason::IpWindow)
        );
        assert!(throttler.check(&user, role, NotificationPriority::Normal, None).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_drops_idle_windows() {
        let throttler = Throttler::new(config());
        throttler.check(&UserId::new("u"), None, NotificationPriority::Normal, Some("1.2.3.4"));
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(throttler.prune(), 3);
        assert_eq!(throttler.stats().tracked_users, 0);
    }
}
