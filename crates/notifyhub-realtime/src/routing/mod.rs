//! Online/offline delivery decision and delivery-state bookkeeping.

pub mod delivery;
pub mod offline_queue;
pub mod online;
pub mod router;

pub use delivery::{DeliveryCounts, DeliveryTracker};
pub use offline_queue::{MessageQueues, PushOutcome};
pub use online::OnlineDelivery;
pub use router::{DeliveryRouter, FanOut, ReplayProgress, RouteOutcome};
