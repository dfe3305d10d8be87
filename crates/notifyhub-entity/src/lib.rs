//! # notifyhub-entity
//!
//! Domain entities for NotifyHub: the notification message and its closed
//! enums, the typed payload variants, the durable row shape, user roles,
//! delivery namespaces and delivery bookkeeping.

pub mod delivery;
pub mod namespace;
pub mod notification;
pub mod role;

pub use delivery::{DeliveryAttempt, DeliveryStatus};
pub use namespace::Namespace;
pub use notification::{
    NotificationCategory, NotificationKind, NotificationMessage, NotificationPriority,
    NotificationRecord, NotificationVariant,
};
pub use role::UserRole;
