//! Transport sink boundary and the in-process session registry.
//!
//! The engine only depends on [`TransportSink`]. [`SessionRegistry`] is the
//! default implementation: the HTTP layer attaches WebSocket sessions to it
//! and drains their outbound channels.

pub mod frame;
pub mod registry;
pub mod session;

use async_trait::async_trait;

use notifyhub_core::result::AppResult;
use notifyhub_core::types::UserId;
use notifyhub_entity::Namespace;

pub use frame::OutboundFrame;
pub use registry::SessionRegistry;
pub use session::{SessionHandle, SessionId, SessionInfo};

/// Real-time delivery sink implemented by the transport layer.
#[async_trait]
pub trait TransportSink: Send + Sync + std::fmt::Debug {
    /// Whether the user has at least one live session in any namespace.
    async fn is_user_connected(&self, user_id: &UserId) -> bool;

    /// Whether the user has at least one live session on `namespace`.
    async fn is_connected_on(&self, user_id: &UserId, _namespace: Namespace) -> bool {
        self.is_user_connected(user_id).await
    }

    /// Hand a serialized frame to every live session of the user on
    /// `namespace`. `Ok(true)` when at least one session accepted it.
    async fn deliver(&self, user_id: &UserId, namespace: Namespace, payload: &str) -> AppResult<bool>;
}
