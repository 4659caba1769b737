//! Worker loop: drains the queue and drives tasks to a terminal status.
//!
//! A delivery is acknowledged only after its outcome is durably persisted;
//! anything short of that nacks the message and relies on the broker's
//! at-least-once redelivery. Reprocessing a task the state machine has
//! already moved past (a redelivered message racing a finished attempt, or a
//! task cancelled before pickup) is treated as the idempotent no-op case and
//! acknowledged without touching the record.

use crate::task::{
    domain::{Task, TaskId, TaskStatus},
    ports::{Delivery, TaskExecutor, TaskMessage, TaskQueue, TaskQueueError, TaskRepository},
    services::{TaskCoordinator, TaskCoordinatorError},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Errors that abort the worker loop itself.
///
/// Per-delivery failures never surface here; they end in a task transition
/// or a redelivery instead.
#[derive(Debug, Error)]
pub enum WorkerLoopError {
    /// The queue receive side failed.
    #[error(transparent)]
    Queue(#[from] TaskQueueError),
}

/// How a single delivery was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDisposition {
    /// The task executed and completed successfully.
    Completed,
    /// The task executed and failed (including timeouts).
    Failed,
    /// The record was already past this message (terminal, cancelled, raced
    /// or missing); acknowledged without processing.
    Skipped,
    /// The payload was malformed; acknowledged and dropped.
    Discarded,
    /// The outcome could not be persisted; returned for redelivery.
    Requeued,
}

/// Queue-draining worker service.
pub struct WorkerLoop<R, Q, C, E>
where
    R: TaskRepository,
    Q: TaskQueue,
    C: Clock + Send + Sync,
    E: TaskExecutor,
{
    coordinator: Arc<TaskCoordinator<R, Q, C>>,
    queue: Arc<Q>,
    executor: Arc<E>,
    concurrency: usize,
    task_timeout: Duration,
}

impl<R, Q, C, E> WorkerLoop<R, Q, C, E>
where
    R: TaskRepository + 'static,
    Q: TaskQueue + 'static,
    C: Clock + Send + Sync + 'static,
    E: TaskExecutor + 'static,
{
    /// Creates a worker loop processing up to `concurrency` deliveries at a
    /// time, each bounded by `task_timeout`.
    #[must_use]
    pub const fn new(
        coordinator: Arc<TaskCoordinator<R, Q, C>>,
        queue: Arc<Q>,
        executor: Arc<E>,
        concurrency: usize,
        task_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            queue,
            executor,
            concurrency,
            task_timeout,
        }
    }

    /// Receives and processes deliveries until the queue fails.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerLoopError::Queue`] when the receive side fails;
    /// in-flight deliveries keep running to completion.
    pub async fn run(self: Arc<Self>) -> Result<(), WorkerLoopError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        info!(
            concurrency = self.concurrency,
            "worker loop started; waiting for tasks"
        );
        loop {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                // The semaphore is never closed by this loop; treat closure
                // as a shutdown request.
                return Ok(());
            };
            let delivery = self.queue.receive().await?;
            let worker = Arc::clone(&self);
            tokio::spawn(async move {
                let disposition = worker.process_delivery(delivery).await;
                tracing::debug!(?disposition, "delivery resolved");
                drop(permit);
            });
        }
    }

    /// Handles one delivery end-to-end, acknowledging or requeueing it.
    pub async fn process_delivery(&self, delivery: Delivery) -> DeliveryDisposition {
        let message = match TaskMessage::from_bytes(delivery.payload()) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "discarding malformed queue payload");
                ack_quietly(delivery).await;
                return DeliveryDisposition::Discarded;
            }
        };

        let task_id = message.task_id();
        match self.claim(task_id).await {
            Ok(Some(task)) => self.execute_and_record(task, delivery).await,
            Ok(None) => {
                ack_quietly(delivery).await;
                DeliveryDisposition::Skipped
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "store unavailable while claiming task");
                nack_quietly(delivery).await;
                DeliveryDisposition::Requeued
            }
        }
    }

    /// Drives the record to `in_progress`, resuming from wherever the last
    /// delivery attempt left it.
    ///
    /// Returns `Ok(None)` for the idempotent skip cases: the record is
    /// missing, already terminal, or another worker raced this claim.
    async fn claim(&self, task_id: TaskId) -> Result<Option<Task>, TaskCoordinatorError> {
        let task = match self.coordinator.get_task(task_id).await {
            Ok(task) => task,
            Err(TaskCoordinatorError::NotFound(_)) => {
                warn!(task_id = %task_id, "queue message references an unknown task");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let advanced = match task.status() {
            TaskStatus::New => {
                self.coordinator
                    .update_status(task_id, TaskStatus::Pending, None, None)
                    .await?;
                self.coordinator
                    .update_status(task_id, TaskStatus::InProgress, None, None)
                    .await
            }
            TaskStatus::Pending => {
                self.coordinator
                    .update_status(task_id, TaskStatus::InProgress, None, None)
                    .await
            }
            // Redelivered mid-execution message: resume the attempt.
            TaskStatus::InProgress => Ok(task),
            status => {
                info!(task_id = %task_id, %status, "redelivered message for settled task");
                return Ok(None);
            }
        };

        match advanced {
            Ok(task) => Ok(Some(task)),
            Err(
                TaskCoordinatorError::IllegalTransition { .. }
                | TaskCoordinatorError::ConcurrentUpdate(_)
                | TaskCoordinatorError::NotFound(_),
            ) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Runs the unit of work under the processing timeout and persists the
    /// outcome before acknowledging.
    async fn execute_and_record(&self, task: Task, delivery: Delivery) -> DeliveryDisposition {
        let task_id = task.id();
        let outcome = tokio::time::timeout(self.task_timeout, self.executor.execute(&task)).await;

        let (disposition, update) = match outcome {
            Ok(Ok(result)) => (
                DeliveryDisposition::Completed,
                self.coordinator
                    .update_status(task_id, TaskStatus::Completed, Some(result), None)
                    .await,
            ),
            Ok(Err(err)) => {
                warn!(task_id = %task_id, error = %err, "task execution failed");
                (
                    DeliveryDisposition::Failed,
                    self.coordinator
                        .update_status(task_id, TaskStatus::Failed, None, Some(err.to_string()))
                        .await,
                )
            }
            Err(_elapsed) => {
                warn!(task_id = %task_id, "task execution timed out");
                let error_info = format!(
                    "Task processing timed out after {}s",
                    self.task_timeout.as_secs()
                );
                (
                    DeliveryDisposition::Failed,
                    self.coordinator
                        .update_status(task_id, TaskStatus::Failed, None, Some(error_info))
                        .await,
                )
            }
        };

        match update {
            Ok(_) => {
                ack_quietly(delivery).await;
                disposition
            }
            Err(
                TaskCoordinatorError::IllegalTransition { .. }
                | TaskCoordinatorError::ConcurrentUpdate(_)
                | TaskCoordinatorError::NotFound(_),
            ) => {
                // Another writer settled the record first; the outcome stays
                // theirs and this message is spent.
                ack_quietly(delivery).await;
                DeliveryDisposition::Skipped
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "failed to persist task outcome");
                nack_quietly(delivery).await;
                DeliveryDisposition::Requeued
            }
        }
    }
}

async fn ack_quietly(delivery: Delivery) {
    if let Err(err) = delivery.ack().await {
        warn!(error = %err, "failed to acknowledge delivery");
    }
}

async fn nack_quietly(delivery: Delivery) {
    if let Err(err) = delivery.nack().await {
        warn!(error = %err, "failed to return delivery to the queue");
    }
}
