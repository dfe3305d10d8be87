//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles known to the notification policy.
///
/// Roles are ordered by privilege level: Admin > Moderator > Reviewer > Viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full administrator; receives admin and security traffic.
    Admin,
    /// Content moderator.
    Moderator,
    /// Caption/content reviewer.
    Reviewer,
    /// Read-only user.
    Viewer,
}

impl UserRole {
    /// Every role, most privileged first.
    pub const ALL: [UserRole; 4] = [Self::Admin, Self::Moderator, Self::Reviewer, Self::Viewer];

    /// Return the privilege level (higher = more privileged).
    pub fn privilege_level(&self) -> u8 {
        match self {
            Self::Admin => 4,
            Self::Moderator => 3,
            Self::Reviewer => 2,
            Self::Viewer => 1,
        }
    }

    /// Check if this role has at least the given role's privileges.
    pub fn has_at_least(&self, other: &UserRole) -> bool {
        self.privilege_level() >= other.privilege_level()
    }

    /// Check if this role is an admin.
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Reviewer => "reviewer",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = notifyhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "reviewer" => Ok(Self::Reviewer),
            "viewer" => Ok(Self::Viewer),
            _ => Err(notifyhub_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: admin, moderator, reviewer, viewer"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_ordering() {
        assert!(UserRole::Admin.has_at_least(&UserRole::Viewer));
        assert!(UserRole::Moderator.has_at_least(&UserRole::Reviewer));
        assert!(!UserRole::Viewer.has_at_least(&UserRole::Reviewer));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("reviewer".parse::<UserRole>().unwrap(), UserRole::Reviewer);
        assert!("owner".parse::<UserRole>().is_err());
    }
}
