//! Notification category enumeration.

use serde::{Deserialize, Serialize};

/// Category of a notification, used for authorization and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Platform-wide system notices.
    System,
    /// Administrative events; admins only.
    Admin,
    /// Ordinary user-facing events.
    User,
    /// Caption processing events.
    Caption,
    /// Platform operation events.
    Platform,
    /// Security events; admins only.
    Security,
    /// Maintenance windows.
    Maintenance,
    /// Storage quota events.
    Storage,
    /// Dashboard refresh hints.
    Dashboard,
    /// Monitoring alerts.
    Monitoring,
    /// Performance alerts.
    Performance,
    /// Component health changes.
    Health,
}

impl NotificationCategory {
    /// Every category.
    pub const ALL: [NotificationCategory; 12] = [
        Self::System,
        Self::Admin,
        Self::User,
        Self::Caption,
        Self::Platform,
        Self::Security,
        Self::Maintenance,
        Self::Storage,
        Self::Dashboard,
        Self::Monitoring,
        Self::Performance,
        Self::Health,
    ];

    /// Return the category as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Admin => "admin",
            Self::User => "user",
            Self::Caption => "caption",
            Self::Platform => "platform",
            Self::Security => "security",
            Self::Maintenance => "maintenance",
            Self::Storage => "storage",
            Self::Dashboard => "dashboard",
            Self::Monitoring => "monitoring",
            Self::Performance => "performance",
            Self::Health => "health",
        }
    }

    /// Parse from a stored string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Categories any signed-in role may receive.
    pub fn is_user_level(&self) -> bool {
        !matches!(
            self,
            Self::System | Self::Admin | Self::Security | Self::Maintenance
        )
    }

    /// Categories restricted to administrators.
    pub fn is_admin_only(&self) -> bool {
        matches!(self, Self::Admin | Self::Security)
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_every_category() {
        for category in NotificationCategory::ALL {
            assert_eq!(NotificationCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(NotificationCategory::parse("billing"), None);
    }

    #[test]
    fn test_admin_only_is_not_user_level() {
        for category in NotificationCategory::ALL {
            if category.is_admin_only() {
                assert!(!category.is_user_level());
            }
        }
    }
}
