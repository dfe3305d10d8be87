//! Typed producer adapters.
//!
//! Each input struct names exactly the fields its producer supplies and
//! converts into a [`NotificationMessage`] with the matching category,
//! kind, priority and payload variant.

use chrono::Utc;
use serde::Deserialize;

use notifyhub_core::types::UserId;
use notifyhub_entity::notification::variant::{
    AdminContext, DashboardUpdate, HealthReport, MonitoringStatus, NotificationVariant, PerformanceMetrics,
    StorageUsage, SystemNotice,
};
use notifyhub_entity::{NotificationCategory, NotificationKind, NotificationMessage, NotificationPriority};

/// Usage at or above this percentage is reported as a warning.
const STORAGE_WARNING_PERCENT: f64 = 90.0;
/// Usage at or above this percentage blocks uploads.
const STORAGE_FULL_PERCENT: f64 = 100.0;
/// Metric values this far over the threshold are errors.
const PERFORMANCE_ERROR_FACTOR: f64 = 1.5;

/// A user's storage quota crossed a reporting threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageLimitNotice {
    pub user_id: UserId,
    pub used_gb: f64,
    pub limit_gb: f64,
    #[serde(default)]
    pub blocked: bool,
}

impl StorageLimitNotice {
    pub fn usage_percent(&self) -> f64 {
        if self.limit_gb <= 0.0 {
            return STORAGE_FULL_PERCENT;
        }
        (self.used_gb / self.limit_gb * 100.0).max(0.0)
    }
}

impl From<StorageLimitNotice> for NotificationMessage {
    fn from(notice: StorageLimitNotice) -> Self {
        let percent = notice.usage_percent();
        let (kind, priority, title) = if percent >= STORAGE_FULL_PERCENT {
            (NotificationKind::Error, NotificationPriority::High, "Storage limit reached")
        } else if percent >= STORAGE_WARNING_PERCENT {
            (NotificationKind::Warning, NotificationPriority::Normal, "Storage almost full")
        } else {
            (NotificationKind::Info, NotificationPriority::Low, "Storage usage update")
        };
        let blocked_at = notice.blocked.then(Utc::now);
        let body = format!(
            "You are using {:.1} GB of {:.1} GB ({percent:.0}%).",
            notice.used_gb, notice.limit_gb
        );
        let mut message = NotificationMessage::new(NotificationCategory::Storage, kind, title, body)
            .for_user(notice.user_id)
            .with_priority(priority)
            .with_variant(NotificationVariant::Storage(StorageUsage {
                used_gb: notice.used_gb,
                limit_gb: notice.limit_gb,
                usage_percent: percent,
                blocked_at,
            }));
        if notice.blocked || percent >= STORAGE_WARNING_PERCENT {
            message = message.with_action("/settings/storage", "Manage storage");
        }
        message
    }
}

/// A performance metric crossed its threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceAlert {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub unit: String,
}

impl From<PerformanceAlert> for NotificationMessage {
    fn from(alert: PerformanceAlert) -> Self {
        let severe = alert.value >= alert.threshold * PERFORMANCE_ERROR_FACTOR;
        let (kind, priority) = if severe {
            (NotificationKind::Error, NotificationPriority::High)
        } else {
            (NotificationKind::Warning, NotificationPriority::Normal)
        };
        let title = format!("Performance alert: {}", alert.metric);
        let body = format!(
            "{} is {}{} (threshold {}{}).",
            alert.metric, alert.value, alert.unit, alert.threshold, alert.unit
        );
        NotificationMessage::new(NotificationCategory::Performance, kind, title, body)
            .with_priority(priority)
            .with_variant(NotificationVariant::Performance(PerformanceMetrics {
                metric: alert.metric,
                value: alert.value,
                threshold: alert.threshold,
                unit: alert.unit,
            }))
    }
}

/// Result of a monitoring check.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringAlert {
    pub service: String,
    pub check: String,
    pub status: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl From<MonitoringAlert> for NotificationMessage {
    fn from(alert: MonitoringAlert) -> Self {
        let (kind, priority) = match alert.status.to_ascii_lowercase().as_str() {
            "down" | "critical" | "failed" => (NotificationKind::Error, NotificationPriority::High),
            "degraded" | "warning" => (NotificationKind::Warning, NotificationPriority::Normal),
            "up" | "ok" | "recovered" => (NotificationKind::Success, NotificationPriority::Low),
            _ => (NotificationKind::Info, NotificationPriority::Normal),
        };
        let title = format!("{} {}: {}", alert.service, alert.check, alert.status);
        let body = alert.detail.clone().unwrap_or_else(|| title.clone());
        NotificationMessage::new(NotificationCategory::Monitoring, kind, title, body)
            .with_priority(priority)
            .with_variant(NotificationVariant::Monitoring(MonitoringStatus {
                service: alert.service,
                check: alert.check,
                status: alert.status,
                detail: alert.detail,
            }))
    }
}

/// A component changed health state.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatusChange {
    pub component: String,
    pub healthy: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

impl From<HealthStatusChange> for NotificationMessage {
    fn from(change: HealthStatusChange) -> Self {
        let (kind, priority, state) = if change.healthy {
            (NotificationKind::Success, NotificationPriority::Normal, "healthy")
        } else {
            (NotificationKind::Error, NotificationPriority::High, "unhealthy")
        };
        let title = format!("{} is {state}", change.component);
        let body = change.detail.clone().unwrap_or_else(|| title.clone());
        NotificationMessage::new(NotificationCategory::Health, kind, title, body)
            .with_priority(priority)
            .with_variant(NotificationVariant::Health(HealthReport {
                component: change.component,
                healthy: change.healthy,
                detail: change.detail,
            }))
    }
}

/// Planned maintenance announced to every user.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceWindow {
    pub title: String,
    pub detail: String,
    pub affects_functionality: bool,
    #[serde(default)]
    pub estimated_duration_minutes: Option<u32>,
}

impl From<MaintenanceWindow> for NotificationMessage {
    fn from(window: MaintenanceWindow) -> Self {
        let (kind, priority) = if window.affects_functionality {
            (NotificationKind::Warning, NotificationPriority::High)
        } else {
            (NotificationKind::Info, NotificationPriority::Normal)
        };
        NotificationMessage::new(NotificationCategory::Maintenance, kind, window.title, window.detail)
            .with_priority(priority)
            .with_variant(NotificationVariant::System(SystemNotice {
                affects_functionality: window.affects_functionality,
                estimated_duration_minutes: window.estimated_duration_minutes,
            }))
    }
}

/// A security-relevant action for administrators.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityEvent {
    #[serde(default)]
    pub actor: Option<String>,
    pub action: String,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl From<SecurityEvent> for NotificationMessage {
    fn from(event: SecurityEvent) -> Self {
        let title = format!("Security event: {}", event.action);
        let body = match &event.actor {
            Some(actor) => format!("{actor} performed {}", event.action),
            None => format!("{} was performed", event.action),
        };
        NotificationMessage::new(NotificationCategory::Security, NotificationKind::Warning, title, body)
            .with_priority(NotificationPriority::High)
            .with_variant(NotificationVariant::Admin(AdminContext {
                admin_only: true,
                action: event.action,
                actor: event.actor,
                target: None,
                details: event.detail,
            }))
    }
}

/// A dashboard widget has fresh data for one user.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardRefresh {
    pub user_id: UserId,
    pub widget: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl From<DashboardRefresh> for NotificationMessage {
    fn from(refresh: DashboardRefresh) -> Self {
        let title = format!("{} updated", refresh.widget);
        NotificationMessage::new(NotificationCategory::Dashboard, NotificationKind::Info, title, "")
            .for_user(refresh.user_id)
            .with_priority(NotificationPriority::Low)
            .with_variant(NotificationVariant::Dashboard(DashboardUpdate {
                widget: refresh.widget,
                data: refresh.data,
            }))
    }
}
