//! Dispatches maintenance tasks to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use notifyhub_core::error::AppError;

/// A named maintenance task.
#[async_trait]
pub trait TaskHandler: Send + Sync + std::fmt::Debug {
    /// Name the task is registered and scheduled under.
    fn task_name(&self) -> &str;

    /// Run the task once, returning a summary of what it did.
    async fn execute(&self) -> Result<Value, TaskError>;
}

/// Error from a task run.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task ran but found the system unhealthy
    #[error("Task check failed: {0}")]
    Failed(String),

    /// No handler is registered under the name
    #[error("No handler registered for task '{0}'")]
    UnknownTask(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches tasks to the handler registered under their name.
#[derive(Debug, Default)]
pub struct TaskExecutor {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task handler, replacing any handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let name = handler.task_name().to_string();
        tracing::info!(task = %name, "Registered task handler");
        self.handlers.insert(name, handler);
    }

    /// Run a task by name.
    pub async fn execute(&self, name: &str) -> Result<Value, TaskError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;
        tracing::debug!(task = %name, "Executing task");
        handler.execute().await
    }

    /// Run a task and log the outcome. Failures never propagate.
    pub async fn run_logged(&self, name: &str) {
        match self.execute(name).await {
            Ok(summary) => tracing::debug!(task = %name, %summary, "Task completed"),
            Err(TaskError::Failed(reason)) => tracing::warn!(task = %name, %reason, "Task reported a failure"),
            Err(e) => tracing::error!(task = %name, error = %e, "Task failed"),
        }
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn registered_tasks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str, bool);

    #[async_trait]
    impl TaskHandler for Fixed {
        fn task_name(&self) -> &str {
            self.0
        }

        async fn execute(&self) -> Result<Value, TaskError> {
            if self.1 {
                Ok(serde_json::json!({ "task": self.0 }))
            } else {
                Err(TaskError::Failed("unhealthy".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_dispatches_by_name() {
        let mut executor = TaskExecutor::new();
        executor.register(Arc::new(Fixed("b", true)));
        executor.register(Arc::new(Fixed("a", false)));

        assert_eq!(executor.registered_tasks(), vec!["a", "b"]);
        assert_eq!(executor.execute("b").await.unwrap()["task"], "b");
        assert!(matches!(executor.execute("a").await, Err(TaskError::Failed(_))));
        assert!(matches!(executor.execute("c").await, Err(TaskError::UnknownTask(_))));
        executor.run_logged("c").await;
    }
}
