//! Notification priority levels.

use serde::{Deserialize, Serialize};

/// Notification priority levels, totally ordered from `Low` to `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// Low priority, background events
    Low,
    /// Normal priority, standard events
    Normal,
    /// High priority, important events
    High,
    /// Critical priority, system-level alerts
    Critical,
}

impl NotificationPriority {
    /// Parse from string, defaulting to `Normal`
    pub fn from_str_value(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Normal,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Whether this priority can be batched
    pub fn can_batch(&self) -> bool {
        matches!(self, Self::Low | Self::Normal)
    }

    /// Whether this priority is still admitted under backpressure
    pub fn passes_backpressure(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl Default for NotificationPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(NotificationPriority::Low < NotificationPriority::Normal);
        assert!(NotificationPriority::High < NotificationPriority::Critical);
    }

    #[test]
    fn test_unknown_defaults_to_normal() {
        assert_eq!(
            NotificationPriority::from_str_value("urgent"),
            NotificationPriority::Normal
        );
        assert_eq!(
            NotificationPriority::from_str_value("CRITICAL"),
            NotificationPriority::Critical
        );
    }
}
