//! Short-window burst flagging.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use notifyhub_core::types::UserId;

use super::window::SlidingWindow;

/// Flags users submitting more than `threshold` requests inside `window`.
///
/// Flagging never blocks a request on its own.
#[derive(Debug)]
pub struct BurstDetector {
    windows: DashMap<UserId, SlidingWindow>,
    span: Duration,
    threshold: usize,
}

impl BurstDetector {
    pub fn new(span: Duration, threshold: u32) -> Self {
        Self {
            windows: DashMap::new(),
            span,
            threshold: threshold as usize,
        }
    }

    /// Record a request and report whether the user is bursting.
    pub fn record(&self, user_id: &UserId, now: Instant) -> bool {
        let mut window = self
            .windows
            .entry(user_id.clone())
            .or_insert_with(|| SlidingWindow::new(self.span));
        window.record(now);
        window.count(now) > self.threshold
    }

    /// Drop idle windows. Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_idle(now));
        before - self.windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_flags_after_threshold() {
        let detector = BurstDetector::new(Duration::from_secs(10), 5);
        let user = UserId::new("alice");
        let now = Instant::now();
        for _ in 0..5 {
            assert!(!detector.record(&user, now));
        }
        assert!(detector.record(&user, now));
        assert!(!detector.record(&user, now + Duration::from_secs(11)));
        assert_eq!(detector.prune(now + Duration::from_secs(30)), 1);
    }
}
