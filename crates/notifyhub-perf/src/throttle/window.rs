//! Sliding-window request counter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Timestamps of requests inside a trailing window.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    hits: VecDeque<Instant>,
    span: Duration,
}

impl SlidingWindow {
    /// Create an empty window covering `span`.
    pub fn new(span: Duration) -> Self {
        Self {
            hits: VecDeque::new(),
            span,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) >= self.span {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// Requests still inside the window at `now`.
    pub fn count(&mut self, now: Instant) -> usize {
        self.evict(now);
        self.hits.len()
    }

    /// Record a request at `now`.
    pub fn record(&mut self, now: Instant) {
        self.evict(now);
        self.hits.push_back(now);
    }

    /// Record a request only if fewer than `limit` are in the window.
    pub fn try_record(&mut self, limit: usize, now: Instant) -> bool {
        if self.count(now) >= limit {
            return false;
        }
        self.hits.push_back(now);
        true
    }

    /// Undo one request recorded at `at`.
    pub fn release(&mut self, at: Instant) {
        if let Some(pos) = self.hits.iter().rposition(|&hit| hit == at) {
            self.hits.remove(pos);
        }
    }

    /// Whether nothing remains in the window at `now`.
    pub fn is_idle(&mut self, now: Instant) -> bool {
        self.count(now) == 0
    }
}
