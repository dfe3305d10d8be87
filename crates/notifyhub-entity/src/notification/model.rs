//! The central notification message.

use chrono::{DateTime, Duration, Utc};
use notifyhub_core::types::{NotificationId, UserId};
use serde::{Deserialize, Serialize};

use super::category::NotificationCategory;
use super::kind::NotificationKind;
use super::priority::NotificationPriority;
use super::variant::NotificationVariant;

/// A notification message.
///
/// Content fields are fixed once the message is handed to the engine. The
/// delivery and read flags only ever move from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Unique identifier.
    pub id: NotificationId,
    /// Presentation kind.
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Recipient; `None` for admin or broadcast targets.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Delivery priority.
    #[serde(default)]
    pub priority: NotificationPriority,
    /// Routing category.
    pub category: NotificationCategory,
    /// Free-form structured data.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Typed specialization.
    #[serde(default)]
    pub variant: NotificationVariant,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time, strictly after `created_at` when set.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the client should prompt for an action.
    #[serde(default)]
    pub requires_action: bool,
    /// Link for the action.
    #[serde(default)]
    pub action_url: Option<String>,
    /// Label for the action.
    #[serde(default)]
    pub action_text: Option<String>,
    #[serde(default)]
    delivered: bool,
    #[serde(default)]
    delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    read: bool,
    #[serde(default)]
    read_at: Option<DateTime<Utc>>,
}

impl NotificationMessage {
    /// Create a message with a generated id and normal priority.
    pub fn new(
        category: NotificationCategory,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            kind,
            title: title.into(),
            body: body.into(),
            user_id: None,
            priority: NotificationPriority::Normal,
            category,
            payload: None,
            variant: NotificationVariant::Standard,
            created_at: Utc::now(),
            expires_at: None,
            requires_action: false,
            action_url: None,
            action_text: None,
            delivered: false,
            delivered_at: None,
            read: false,
            read_at: None,
        }
    }

    /// Use a producer-supplied id.
    pub fn with_id(mut self, id: impl Into<NotificationId>) -> Self {
        self.id = id.into();
        self
    }

    /// Address the message to a user.
    pub fn for_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_variant(mut self, variant: NotificationVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set an absolute expiry time.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Expire `ttl` after creation.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(self.created_at + ttl);
        self
    }

    /// Attach a call to action.
    pub fn with_action(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.requires_action = true;
        self.action_url = Some(url.into());
        self.action_text = Some(text.into());
        self
    }

    /// Whether the message is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Whether the message is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Flag the message as delivered. Returns `true` on the first transition.
    pub fn mark_delivered(&mut self) -> bool {
        if self.delivered {
            return false;
        }
        self.delivered = true;
        self.delivered_at = Some(Utc::now());
        true
    }

    /// Flag the message as read. Returns `true` on the first transition.
    pub fn mark_read(&mut self) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(Utc::now());
        true
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        self.read_at
    }

    /// Copy of a fanned-out message addressed to one recipient, with its
    /// own derived id and fresh flags.
    pub fn recipient_copy(&self, user_id: &UserId) -> Self {
        let mut copy = self.clone();
        copy.id = self.id.for_recipient(user_id);
        copy.user_id = Some(user_id.clone());
        copy.delivered = false;
        copy.delivered_at = None;
        copy.read = false;
        copy.read_at = None;
        copy
    }

    /// Serialized size in bytes, used for batching and compression decisions.
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }

    /// Restore flags loaded from durable storage.
    pub(crate) fn restore_flags(
        &mut self,
        delivered_at: Option<DateTime<Utc>>,
        delivered: bool,
        read_at: Option<DateTime<Utc>>,
        read: bool,
    ) {
        self.delivered = delivered;
        self.delivered_at = delivered_at;
        self.read = read;
        self.read_at = read_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NotificationMessage {
        NotificationMessage::new(
            NotificationCategory::User,
            NotificationKind::Info,
            "Caption ready",
            "Your captions are available",
        )
        .for_user("alice")
    }

    #[test]
    fn test_flags_are_monotonic() {
        let mut msg = sample();
        assert!(msg.mark_delivered());
        assert!(!msg.mark_delivered());
        assert!(msg.mark_read());
        assert!(!msg.mark_read());
        assert!(msg.is_delivered());
        assert!(msg.is_read());
    }

    #[test]
    fn test_expiry() {
        let msg = sample().expires_in(Duration::seconds(30));
        assert!(!msg.is_expired_at(msg.created_at));
        assert!(msg.is_expired_at(msg.created_at + Duration::seconds(30)));
        assert!(!sample().is_expired());
    }

    #[test]
    fn test_recipient_copy_resets_flags() {
        let mut msg = NotificationMessage::new(
            NotificationCategory::System,
            NotificationKind::Warning,
            "Maintenance",
            "Tonight",
        )
        .with_id("m-1");
        msg.mark_delivered();
        let copy = msg.recipient_copy(&UserId::new("bob"));
        assert_eq!(copy.id.as_str(), "m-1:bob");
        assert_eq!(copy.user_id, Some(UserId::new("bob")));
        assert!(!copy.is_delivered());
    }

    #[test]
    fn test_serde_keeps_flags() {
        let mut msg = sample();
        msg.mark_read();
        let json = serde_json::to_string(&msg).unwrap();
        let back: NotificationMessage = serde_json::from_str(&json).unwrap();
        assert!(back.is_read());
        assert_eq!(back, msg);
    }
}
