//! Key builders for engine-internal maps.
//!
//! Centralising key construction keeps every producer path agreeing on
//! when two notifications count as the same event.

use notifyhub_core::types::UserId;
use notifyhub_entity::NotificationCategory;

/// Prefix applied to all NotifyHub keys.
const PREFIX: &str = "notifyhub";

/// Key for duplicate suppression of a (user, category, title) triple.
pub fn dedup(user_id: &UserId, category: NotificationCategory, title: &str) -> String {
    format!("{PREFIX}:dedup:{user_id}:{category}:{}", title.trim().to_lowercase())
}
