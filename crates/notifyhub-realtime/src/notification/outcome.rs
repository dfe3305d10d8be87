//! Outcomes reported by the manager's send operations.

use serde::Serialize;

use notifyhub_perf::RateLimitReason;

/// Why a send was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// The message failed validation.
    Validation,
    /// The recipient's role may not receive the message.
    Authorization,
    /// A throttle rejected the message.
    RateLimited(RateLimitReason),
    /// The message expired before it could be routed.
    Expired,
    /// An equivalent message was sent within the dedup window.
    Duplicate,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => f.write_str("validation"),
            Self::Authorization => f.write_str("authorization"),
            Self::RateLimited(reason) => write!(f, "rate_limited:{reason}"),
            Self::Expired => f.write_str("expired"),
            Self::Duplicate => f.write_str("duplicate"),
        }
    }
}

/// Result of a single-recipient send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Accepted by a live session.
    Delivered,
    /// Handed to the batcher for a live session.
    Batched,
    /// Already delivered within the cache TTL.
    Cached,
    /// No live session; placed on the offline queue.
    Queued,
    /// Backpressure diverted the message to the offline queue.
    Deflected,
    Rejected(RejectReason),
}

impl SendOutcome {
    /// Online delivery and offline queuing both count as accepted.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Counts from one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutSummary {
    pub recipients: usize,
    pub delivered: usize,
    pub queued: usize,
    pub skipped: usize,
    pub throttled: usize,
}

impl FanOutSummary {
    pub fn accepted(&self) -> usize {
        self.delivered + self.queued
    }
}

/// Result of an admin or broadcast send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FanOutOutcome {
    Completed(FanOutSummary),
    Rejected { reason: RejectReason },
}

impl FanOutOutcome {
    /// At least one recipient accepted the message.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Completed(summary) if summary.accepted() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_outcomes() {
        assert!(SendOutcome::Queued.is_accepted());
        assert!(SendOutcome::Deflected.is_accepted());
        assert!(!SendOutcome::Rejected(RejectReason::Duplicate).is_accepted());
        assert_eq!(
            SendOutcome::Rejected(RejectReason::RateLimited(RateLimitReason::UserWindow)).reject_reason(),
            Some(RejectReason::RateLimited(RateLimitReason::UserWindow))
        );
    }

    #[test]
    fn test_fan_out_partial_success() {
        let none = FanOutOutcome::Completed(FanOutSummary {
            recipients: 3,
            skipped: 3,
            ..FanOutSummary::default()
        });
        assert!(!none.is_accepted());
        let partial = FanOutOutcome::Completed(FanOutSummary {
            recipients: 3,
            queued: 1,
            throttled: 2,
            ..FanOutSummary::default()
        });
        assert!(partial.is_accepted());
    }
}
