//! # notifyhub-database
//!
//! PostgreSQL connection management, migrations, and the two storage seams
//! the notification engine depends on: the [`NotificationStore`] that keeps
//! message rows durable and the [`UserDirectory`] that resolves roles and
//! recipients. Each seam has a PostgreSQL and an in-memory implementation.

pub mod connection;
pub mod directory;
pub mod migration;
pub mod store;

pub use connection::DatabasePool;
pub use directory::{PgUserDirectory, StaticUserDirectory, UserDirectory};
pub use store::{InMemoryNotificationStore, NotificationStore, PgNotificationStore};
