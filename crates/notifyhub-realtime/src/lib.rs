//! # notifyhub-realtime
//!
//! The notification routing and delivery core:
//!
//! - [`authorization`]: role/category permission table, namespace
//!   resolution and the security audit trail
//! - [`transport`]: the narrow transport sink contract and the in-process
//!   session registry implementing it
//! - [`routing`]: offline and retry queues, delivery tracking and the
//!   online/offline delivery router
//! - [`notification`]: validation, dedup, history, producer adapters and
//!   the [`NotificationManager`] façade
//! - [`engine`]: the [`NotificationEngine`] context object that builds
//!   and tears down everything once per process

pub mod authorization;
pub mod engine;
pub mod metrics;
pub mod notification;
pub mod routing;
pub mod stats;
pub mod transport;

pub use engine::NotificationEngine;
pub use notification::manager::NotificationManager;
pub use notification::outcome::{RejectReason, SendOutcome};
pub use transport::{SessionRegistry, TransportSink};
