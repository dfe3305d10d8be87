//! # notifyhub-cache
//!
//! Bounded caches for recently delivered notifications.
//!
//! - [`store::BoundedStore`]: capacity-bounded map with LRU or FIFO
//!   eviction and lazily purged TTL
//! - [`MessageCache`]: per-user tier in front of a global tier, with
//!   transparent compression of large entries
//! - [`codec`]: deflate helpers shared with the batcher

pub mod codec;
pub mod keys;
pub mod message_cache;
pub mod store;

pub use message_cache::{CacheStats, MessageCache};
pub use store::BoundedStore;
