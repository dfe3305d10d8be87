//! Suppression of repeated notifications within a short window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Remembers when each key was last sent.
#[derive(Debug)]
pub struct Deduplicator {
    window: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl Deduplicator {
    /// A zero window disables suppression.
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    /// `true` if the event should go out, `false` if it repeats a key seen
    /// within the window.
    pub fn should_send(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let now = Instant::now();
        let mut map = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = map.get(key) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        map.insert(key.to_string(), now);
        true
    }

    /// Forget keys older than the window. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut map = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, seen| now.duration_since(*seen) < self.window);
        before - map.len()
    }

    pub fn tracked(&self) -> usize {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_repeats_within_window_are_suppressed() {
        let dedup = Deduplicator::new(500);
        assert!(dedup.should_send("k"));
        assert!(!dedup.should_send("k"));
        assert!(dedup.should_send("other"));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(dedup.should_send("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_forgets_old_keys() {
        let dedup = Deduplicator::new(100);
        dedup.should_send("a");
        tokio::time::advance(Duration::from_millis(150)).await;
        dedup.should_send("b");
        assert_eq!(dedup.cleanup(), 1);
        assert_eq!(dedup.tracked(), 1);
    }

    #[test]
    fn test_zero_window_disables() {
        let dedup = Deduplicator::new(0);
        assert!(!dedup.is_enabled());
        assert!(dedup.should_send("k"));
        assert!(dedup.should_send("k"));
    }
}
