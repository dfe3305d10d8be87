//! Notification domain entities.

pub mod category;
pub mod kind;
pub mod model;
pub mod priority;
pub mod record;
pub mod variant;

pub use category::NotificationCategory;
pub use kind::NotificationKind;
pub use model::NotificationMessage;
pub use priority::NotificationPriority;
pub use record::NotificationRecord;
pub use variant::NotificationVariant;
