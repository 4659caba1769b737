//! Simulated unit-of-work executor.

use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;

use crate::task::{
    domain::{Task, TaskPriority},
    ports::{ExecutionError, TaskExecutor},
};

/// Executor that simulates variable-duration work keyed by priority.
///
/// Higher-priority tasks finish faster, mirroring a workload where urgent
/// jobs are kept small.
#[derive(Debug, Clone)]
pub struct SimulatedTaskExecutor<C> {
    clock: Arc<C>,
}

impl<C> SimulatedTaskExecutor<C> {
    /// Creates a simulated executor.
    #[must_use]
    pub const fn new(clock: Arc<C>) -> Self {
        Self { clock }
    }

    /// Returns the simulated processing time for `priority`.
    #[must_use]
    pub const fn processing_delay(priority: TaskPriority) -> Duration {
        match priority {
            TaskPriority::High => Duration::from_secs(1),
            TaskPriority::Medium => Duration::from_secs(3),
            TaskPriority::Low => Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl<C> TaskExecutor for SimulatedTaskExecutor<C>
where
    C: Clock + Send + Sync,
{
    async fn execute(&self, task: &Task) -> Result<String, ExecutionError> {
        tokio::time::sleep(Self::processing_delay(task.priority())).await;
        Ok(format!(
            "Task {} processed successfully at {}",
            task.id(),
            self.clock.utc().to_rfc3339()
        ))
    }
}
