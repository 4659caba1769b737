//! Executor port for the task's pluggable unit of work.

use crate::task::domain::Task;
use async_trait::async_trait;
use thiserror::Error;

/// Failure inside a task's unit of work.
///
/// Execution failures are always recovered into a `failed` transition by the
/// worker loop; they never abort the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    /// Creates an execution error with the given explanation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pluggable execution hook invoked once per claimed task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Runs the task's unit of work, yielding a result summary.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the unit of work fails; the worker
    /// loop records it on the task and moves on.
    async fn execute(&self, task: &Task) -> Result<String, ExecutionError>;
}
