//! Delivery attempt bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of the most recent delivery attempt for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Queued, not yet handed to a live session.
    Pending,
    /// Accepted by at least one live session.
    Delivered,
    /// The last online attempt failed.
    Failed,
    /// Expired before it could be delivered.
    Expired,
}

impl DeliveryStatus {
    /// Whether no further attempts are expected.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Delivered | Self::Expired)
    }
}

/// Per-message delivery record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Current status.
    pub status: DeliveryStatus,
    /// Number of online attempts made.
    pub attempts: u32,
    /// When the last attempt happened.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl DeliveryAttempt {
    /// A fresh pending record.
    pub fn pending() -> Self {
        Self {
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    /// Record the outcome of an online attempt.
    pub fn record(&mut self, delivered: bool) {
        self.attempts += 1;
        self.last_attempt_at = Some(Utc::now());
        if self.status != DeliveryStatus::Delivered {
            self.status = if delivered {
                DeliveryStatus::Delivered
            } else {
                DeliveryStatus::Failed
            };
        }
    }
}

impl Default for DeliveryAttempt {
    fn default() -> Self {
        Self::pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivered_is_sticky() {
        let mut attempt = DeliveryAttempt::pending();
        attempt.record(false);
        assert_eq!(attempt.status, DeliveryStatus::Failed);
        attempt.record(true);
        attempt.record(false);
        assert_eq!(attempt.status, DeliveryStatus::Delivered);
        assert_eq!(attempt.attempts, 3);
    }
}
