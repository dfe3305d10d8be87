//! Typed payload variants layered onto the base message fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::NotificationCategory;

/// Structured context carried by admin-only messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminContext {
    /// Only deliverable to administrators.
    pub admin_only: bool,
    /// Action that produced the event.
    pub action: String,
    /// Who performed the action.
    #[serde(default)]
    pub actor: Option<String>,
    /// What the action targeted.
    #[serde(default)]
    pub target: Option<String>,
    /// Free-form details.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// System-wide notice attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNotice {
    /// Whether users will lose functionality.
    pub affects_functionality: bool,
    /// Expected duration of the disruption.
    #[serde(default)]
    pub estimated_duration_minutes: Option<u32>,
}

/// Storage quota usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub used_gb: f64,
    pub limit_gb: f64,
    pub usage_percent: f64,
    /// When uploads were blocked, if they were.
    #[serde(default)]
    pub blocked_at: Option<DateTime<Utc>>,
}

/// A performance metric crossing its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub unit: String,
}

/// Monitoring check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringStatus {
    pub service: String,
    pub check: String,
    pub status: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Component health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub component: String,
    pub healthy: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Dashboard widget refresh hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardUpdate {
    pub widget: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Closed set of message specializations, each with a fixed payload shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationVariant {
    /// No specialization.
    #[default]
    Standard,
    Admin(AdminContext),
    System(SystemNotice),
    Storage(StorageUsage),
    Performance(PerformanceMetrics),
    Monitoring(MonitoringStatus),
    Health(HealthReport),
    Dashboard(DashboardUpdate),
}

impl NotificationVariant {
    /// Whether this variant may be attached to a message of `category`.
    pub fn accepts_category(&self, category: NotificationCategory) -> bool {
        use NotificationCategory as C;
        match self {
            Self::Standard => true,
            Self::Admin(_) => matches!(category, C::Admin | C::Security),
            Self::System(_) => matches!(category, C::System | C::Maintenance),
            Self::Storage(_) => category == C::Storage,
            Self::Performance(_) => category == C::Performance,
            Self::Monitoring(_) => category == C::Monitoring,
            Self::Health(_) => category == C::Health,
            Self::Dashboard(_) => category == C::Dashboard,
        }
    }

    /// Whether the variant restricts delivery to administrators.
    pub fn is_admin_only(&self) -> bool {
        matches!(self, Self::Admin(ctx) if ctx.admin_only)
    }

    /// Variant tag as a string.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Admin(_) => "admin",
            Self::System(_) => "system",
            Self::Storage(_) => "storage",
            Self::Performance(_) => "performance",
            Self::Monitoring(_) => "monitoring",
            Self::Health(_) => "health",
            Self::Dashboard(_) => "dashboard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_is_tagged() {
        let variant = NotificationVariant::Storage(StorageUsage {
            used_gb: 9.5,
            limit_gb: 10.0,
            usage_percent: 95.0,
            blocked_at: None,
        });
        let json = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["type"], "storage");
        assert_eq!(json["usage_percent"], 95.0);
    }

    #[test]
    fn test_category_compatibility() {
        let health = NotificationVariant::Health(HealthReport {
            component: "db".into(),
            healthy: false,
            detail: None,
        });
        assert!(health.accepts_category(NotificationCategory::Health));
        assert!(!health.accepts_category(NotificationCategory::User));
        assert!(NotificationVariant::Standard.accepts_category(NotificationCategory::Security));
    }
}
