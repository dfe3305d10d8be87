//! Newtype wrappers around opaque string identifiers.
//!
//! User identifiers come from the external identity store and message
//! identifiers may be producer-supplied, so both are carried as strings.
//! Distinct types prevent passing a `UserId` where a `NotificationId` is
//! expected.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around `String`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a user in the external identity store.
    UserId
);

define_id!(
    /// Unique identifier of a notification message.
    NotificationId
);

impl NotificationId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Derive the identifier of a per-recipient copy of a fanned-out message.
    pub fn for_recipient(&self, user_id: &UserId) -> Self {
        Self(format!("{}:{}", self.0, user_id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = NotificationId::generate();
        let b = NotificationId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_recipient_id_is_stable() {
        let base = NotificationId::new("n-1");
        let user = UserId::new("alice");
        assert_eq!(base.for_recipient(&user).as_str(), "n-1:alice");
        assert_eq!(base.for_recipient(&user), base.for_recipient(&user));
    }

    #[test]
    fn test_serde_transparent() {
        let id = UserId::new("u-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u-42\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
