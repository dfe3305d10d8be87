//! # notifyhub-perf
//!
//! Performance control for outbound notifications:
//!
//! - [`throttle`]: per-user, per-IP and global rate limiting with priority
//!   bypass, backpressure and burst flagging
//! - [`batch`]: per-key batching with size and deadline flushes
//! - [`memory`]: object pools and memory-budget driven reclamation
//! - [`optimizer`]: one entry point tying the above to the message cache

pub mod batch;
pub mod memory;
pub mod optimizer;
pub mod throttle;

pub use batch::{BatchKey, BatchSink, CompressedBatch, MessageBatcher};
pub use memory::{MemoryManager, MemoryProbe};
pub use optimizer::{DeliveryPlan, PerformanceOptimizer, PerformanceSnapshot};
pub use throttle::{RateLimitReason, ThrottleDecision, Throttler};
