//! Logical delivery channels understood by the transport layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A delivery namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Channel every authenticated user listens on.
    General,
    /// Channel reserved for administrators.
    Admin,
}

impl Namespace {
    /// Transport path of the namespace.
    pub fn path(&self) -> &'static str {
        match self {
            Self::General => "/notifications",
            Self::Admin => "/admin",
        }
    }

    /// Short name of the namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Namespace {
    type Err = notifyhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('/').to_lowercase().as_str() {
            "general" | "notifications" | "" => Ok(Self::General),
            "admin" => Ok(Self::Admin),
            _ => Err(notifyhub_core::AppError::validation(format!(
                "Unknown namespace: '{s}'"
            ))),
        }
    }
}
