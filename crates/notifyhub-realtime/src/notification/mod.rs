//! Producer-facing notification handling.

pub mod dedup;
pub mod formatter;
pub mod history;
pub mod ledger;
pub mod manager;
pub mod outcome;
pub mod validator;

pub use ledger::DeliveryLedger;
pub use manager::NotificationManager;
pub use outcome::{FanOutOutcome, FanOutSummary, RejectReason, SendOutcome};
