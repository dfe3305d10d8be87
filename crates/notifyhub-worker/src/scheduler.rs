//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use notifyhub_core::config::WorkerConfig;
use notifyhub_core::error::AppError;

use crate::executor::TaskExecutor;
use crate::tasks::{ENGINE_HEALTH, LIMITER_PRUNE, NOTIFICATION_CLEANUP};

/// Runs registered maintenance tasks on cron schedules.
pub struct CronScheduler {
    scheduler: JobScheduler,
    executor: Arc<TaskExecutor>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("tasks", &self.executor.registered_tasks())
            .finish()
    }
}

impl CronScheduler {
    pub async fn new(executor: Arc<TaskExecutor>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self { scheduler, executor })
    }

    /// Schedule the built-in tasks with the configured cron expressions.
    pub async fn register_default_tasks(&self, config: &WorkerConfig) -> Result<(), AppError> {
        self.schedule(NOTIFICATION_CLEANUP, &config.cleanup_cron).await?;
        self.schedule(LIMITER_PRUNE, &config.prune_cron).await?;
        self.schedule(ENGINE_HEALTH, &config.health_cron).await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Run the task registered as `name` on a six-field cron schedule.
    pub async fn schedule(&self, name: &str, cron: &str) -> Result<(), AppError> {
        if !self.executor.has_handler(name) {
            return Err(AppError::configuration(format!(
                "Cannot schedule '{}': no handler registered",
                name
            )));
        }

        let executor = Arc::clone(&self.executor);
        let task = name.to_string();
        let job = CronJob::new_async(cron, move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            let task = task.clone();
            Box::pin(async move {
                tracing::trace!(task = %task, "Scheduled task firing");
                executor.run_logged(&task).await;
            })
        })
        .map_err(|e| {
            AppError::configuration(format!("Invalid schedule '{}' for {}: {}", cron, name, e))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {} schedule: {}", name, e)))?;

        tracing::info!(task = %name, cron = %cron, "Registered scheduled task");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}
