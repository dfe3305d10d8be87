//! Durable row shape of a notification.

use chrono::{DateTime, Utc};
use notifyhub_core::error::AppError;
use notifyhub_core::types::{NotificationId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

use super::category::NotificationCategory;
use super::kind::NotificationKind;
use super::model::NotificationMessage;
use super::priority::NotificationPriority;
use super::variant::NotificationVariant;

/// A row of the `notifications` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub priority: String,
    pub category: String,
    pub payload: Option<serde_json::Value>,
    pub variant: Json<NotificationVariant>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub requires_action: bool,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<&NotificationMessage> for NotificationRecord {
    fn from(msg: &NotificationMessage) -> Self {
        Self {
            id: msg.id.as_str().to_string(),
            user_id: msg.user_id.as_ref().map(|u| u.as_str().to_string()),
            kind: msg.kind.as_str().to_string(),
            title: msg.title.clone(),
            body: msg.body.clone(),
            priority: msg.priority.as_str().to_string(),
            category: msg.category.as_str().to_string(),
            payload: msg.payload.clone(),
            variant: Json(msg.variant.clone()),
            created_at: msg.created_at,
            expires_at: msg.expires_at,
            requires_action: msg.requires_action,
            action_url: msg.action_url.clone(),
            action_text: msg.action_text.clone(),
            delivered: msg.is_delivered(),
            delivered_at: msg.delivered_at(),
            read: msg.is_read(),
            read_at: msg.read_at(),
        }
    }
}

impl TryFrom<NotificationRecord> for NotificationMessage {
    type Error = AppError;

    fn try_from(row: NotificationRecord) -> Result<Self, Self::Error> {
        let kind = NotificationKind::parse(&row.kind)
            .ok_or_else(|| AppError::validation(format!("Unknown notification kind '{}'", row.kind)))?;
        let category = NotificationCategory::parse(&row.category).ok_or_else(|| {
            AppError::validation(format!("Unknown notification category '{}'", row.category))
        })?;

        let mut msg = NotificationMessage::new(category, kind, row.title, row.body)
            .with_id(NotificationId::new(row.id))
            .with_priority(NotificationPriority::from_str_value(&row.priority))
            .with_variant(row.variant.0);
        msg.user_id = row.user_id.map(UserId::new);
        msg.payload = row.payload;
        msg.created_at = row.created_at;
        msg.expires_at = row.expires_at;
        msg.requires_action = row.requires_action;
        msg.action_url = row.action_url;
        msg.action_text = row.action_text;
        msg.restore_flags(row.delivered_at, row.delivered, row.read_at, row.read);
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_restores_message() {
        let mut msg = NotificationMessage::new(
            NotificationCategory::Storage,
            NotificationKind::Warning,
            "Storage almost full",
            "You are at 92%",
        )
        .for_user("carol")
        .with_priority(NotificationPriority::High)
        .with_payload(serde_json::json!({"usage": 92}));
        msg.mark_delivered();

        let record = NotificationRecord::from(&msg);
        assert_eq!(record.category, "storage");
        assert!(record.delivered);

        let restored = NotificationMessage::try_from(record).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let msg = NotificationMessage::new(
            NotificationCategory::User,
            NotificationKind::Info,
            "t",
            "b",
        );
        let mut record = NotificationRecord::from(&msg);
        record.category = "billing".into();
        assert!(NotificationMessage::try_from(record).is_err());
    }
}
