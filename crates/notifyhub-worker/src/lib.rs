//! Scheduled maintenance for the notification engine.
//!
//! This crate provides:
//! - A task executor that dispatches named maintenance tasks to handlers
//! - A cron scheduler that runs each task on its configured schedule
//! - Built-in tasks for expiry cleanup, limiter pruning and health checks

pub mod executor;
pub mod scheduler;
pub mod tasks;

pub use executor::{TaskError, TaskExecutor, TaskHandler};
pub use scheduler::CronScheduler;
