//! Wire frames pushed to sessions.

use serde::Serialize;

use notifyhub_entity::{Namespace, NotificationMessage};
use notifyhub_perf::CompressedBatch;

/// A frame written to a session's outbound channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame<'a> {
    /// A single notification.
    Notification {
        namespace: Namespace,
        notification: &'a NotificationMessage,
    },
    /// Several notifications deflated into one payload.
    NotificationBatch {
        namespace: Namespace,
        batch: &'a CompressedBatch,
    },
}

impl OutboundFrame<'_> {
    /// Serialize the frame to its JSON text form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use notifyhub_entity::{NotificationCategory, NotificationKind};

    use super::*;

    #[test]
    fn test_frames_are_tagged() {
        let msg = NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, "hi", "there");
        let json = OutboundFrame::Notification {
            namespace: Namespace::General,
            notification: &msg,
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["namespace"], "general");
        assert_eq!(value["notification"]["title"], "hi");
    }
}
