//! Task coordinator: the single mediator of task state changes.
//!
//! Every mutation of a task record flows through this service, which owns
//! the persist-then-publish protocol at creation time and enforces the
//! lifecycle transition table everywhere else.

use crate::task::{
    domain::{NewTask, Task, TaskDomainError, TaskId, TaskPriority, TaskStatus, TaskTitle},
    ports::{
        PageBoundsError, PageRequest, TaskFilter, TaskMessage, TaskQueue, TaskQueueError,
        TaskRepository, TaskRepositoryError, WirePriority,
    },
};
use chrono::TimeDelta;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Request payload for submitting a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    priority: TaskPriority,
}

impl CreateTaskRequest {
    /// Creates a request with the required title and default priority.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: TaskPriority::default(),
        }
    }

    /// Sets the free-text description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the scheduling priority.
    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Service-level errors for task coordination.
#[derive(Debug, Error)]
pub enum TaskCoordinatorError {
    /// Input failed domain validation.
    #[error(transparent)]
    Validation(TaskDomainError),

    /// Pagination parameters out of bounds.
    #[error(transparent)]
    PageBounds(#[from] PageBoundsError),

    /// No task with the given identifier.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The requested transition is illegal for the task's current status.
    #[error("illegal status transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        /// Task whose transition was rejected.
        task_id: TaskId,
        /// Status the task currently occupies.
        from: TaskStatus,
        /// Status the caller requested.
        to: TaskStatus,
    },

    /// A concurrent update won the race for this task's next transition.
    #[error("concurrent update for task {0}")]
    ConcurrentUpdate(TaskId),

    /// Store failure.
    #[error(transparent)]
    Repository(TaskRepositoryError),

    /// Queue failure outside of creation-time publication.
    #[error(transparent)]
    Queue(#[from] TaskQueueError),
}

/// Result type for task coordinator operations.
pub type TaskCoordinatorResult<T> = Result<T, TaskCoordinatorError>;

fn map_domain_error(err: TaskDomainError) -> TaskCoordinatorError {
    match err {
        TaskDomainError::InvalidStatusTransition { task_id, from, to } => {
            TaskCoordinatorError::IllegalTransition { task_id, from, to }
        }
        other => TaskCoordinatorError::Validation(other),
    }
}

fn map_repository_error(err: TaskRepositoryError) -> TaskCoordinatorError {
    match err {
        TaskRepositoryError::NotFound(id) => TaskCoordinatorError::NotFound(id),
        TaskRepositoryError::StaleStatus { task_id, .. } => {
            TaskCoordinatorError::ConcurrentUpdate(task_id)
        }
        other => TaskCoordinatorError::Repository(other),
    }
}

/// Task coordination service.
#[derive(Clone)]
pub struct TaskCoordinator<R, Q, C>
where
    R: TaskRepository,
    Q: TaskQueue,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    queue: Arc<Q>,
    clock: Arc<C>,
}

impl<R, Q, C> TaskCoordinator<R, Q, C>
where
    R: TaskRepository,
    Q: TaskQueue,
    C: Clock + Send + Sync,
{
    /// Creates a new task coordinator.
    #[must_use]
    pub const fn new(repository: Arc<R>, queue: Arc<Q>, clock: Arc<C>) -> Self {
        Self {
            repository,
            queue,
            clock,
        }
    }

    /// Validates and persists a new task, then publishes its queue message.
    ///
    /// Persist-then-publish is a two-step saga, not a transaction: when
    /// publication fails the task stays persisted in `new` and the stalled
    /// sweep ([`Self::republish_stalled`]) is responsible for recovery, so
    /// the failure is logged and absorbed here.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::Validation`] for rejected input and
    /// [`TaskCoordinatorError::Repository`] when persistence fails (no
    /// record is left visible in that case).
    pub async fn create_task(&self, request: CreateTaskRequest) -> TaskCoordinatorResult<Task> {
        let title = TaskTitle::new(request.title).map_err(map_domain_error)?;
        let draft = NewTask::new(title, request.description, request.priority);

        let task = self
            .repository
            .create(&draft)
            .await
            .map_err(map_repository_error)?;

        if let Err(err) = self.publish(&task).await {
            warn!(
                task_id = %task.id(),
                error = %err,
                "task persisted but queue publication failed; awaiting republish sweep"
            );
        }
        Ok(task)
    }

    /// Returns one page of tasks matching `filter` plus the total count of
    /// matches before pagination.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::Repository`] when the store fails.
    pub async fn list_tasks(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> TaskCoordinatorResult<(Vec<Task>, u64)> {
        self.repository
            .list(filter, page)
            .await
            .map_err(map_repository_error)
    }

    /// Returns the task with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::NotFound`] when no such task exists.
    pub async fn get_task(&self, id: TaskId) -> TaskCoordinatorResult<Task> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(map_repository_error)?
            .ok_or(TaskCoordinatorError::NotFound(id))
    }

    /// Cancels a task that has not started executing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::NotFound`] when no such task exists
    /// and [`TaskCoordinatorError::IllegalTransition`] when the task is
    /// executing or already terminal.
    pub async fn cancel_task(&self, id: TaskId) -> TaskCoordinatorResult<Task> {
        let mut task = self.get_task(id).await?;
        let previous = task.status();
        task.cancel(&*self.clock).map_err(map_domain_error)?;
        self.repository
            .update(&task, previous)
            .await
            .map_err(map_repository_error)?;
        Ok(task)
    }

    /// Applies a worker-driven status transition, the only mutation entry
    /// point the worker loop uses.
    ///
    /// Entering `in_progress` stamps `started_at` if unset; entering a
    /// terminal status stamps `completed_at` if unset.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::IllegalTransition`] when the
    /// lifecycle table forbids the move (illegal transitions are rejected,
    /// never silently ignored) and [`TaskCoordinatorError::ConcurrentUpdate`]
    /// when another writer raced this transition.
    pub async fn update_status(
        &self,
        id: TaskId,
        new_status: TaskStatus,
        result: Option<String>,
        error_info: Option<String>,
    ) -> TaskCoordinatorResult<Task> {
        let mut task = self.get_task(id).await?;
        let previous = task.status();

        match new_status {
            TaskStatus::Pending => task.mark_pending(&*self.clock),
            TaskStatus::InProgress => task.start(&*self.clock),
            TaskStatus::Completed => task.complete(result, &*self.clock),
            TaskStatus::Failed => task.fail(error_info, &*self.clock),
            TaskStatus::Cancelled => task.cancel(&*self.clock),
            TaskStatus::New => Err(TaskDomainError::InvalidStatusTransition {
                task_id: id,
                from: previous,
                to: TaskStatus::New,
            }),
        }
        .map_err(map_domain_error)?;

        self.repository
            .update(&task, previous)
            .await
            .map_err(map_repository_error)?;
        Ok(task)
    }

    /// Re-publishes queue messages for tasks stuck in `new` longer than
    /// `older_than`, the recovery half of the persist-then-publish saga.
    ///
    /// Returns how many messages were republished.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::Repository`] when the stalled-task
    /// query fails; individual publish failures are logged and skipped.
    pub async fn republish_stalled(&self, older_than: TimeDelta) -> TaskCoordinatorResult<usize> {
        let cutoff = self.clock.utc() - older_than;
        let stalled = self
            .repository
            .find_new_older_than(cutoff)
            .await
            .map_err(map_repository_error)?;

        let mut republished = 0_usize;
        for task in &stalled {
            match self.publish(task).await {
                Ok(()) => republished += 1,
                Err(err) => {
                    warn!(task_id = %task.id(), error = %err, "republish attempt failed");
                }
            }
        }
        if republished > 0 {
            info!(count = republished, "republished stalled task messages");
        }
        Ok(republished)
    }

    /// Round-trips the store, for liveness checks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCoordinatorError::Repository`] when the store does not
    /// answer.
    pub async fn ping(&self) -> TaskCoordinatorResult<()> {
        self.repository.ping().await.map_err(map_repository_error)
    }

    async fn publish(&self, task: &Task) -> Result<(), TaskQueueError> {
        self.queue
            .publish(
                &TaskMessage::new(task.id()),
                WirePriority::from(task.priority()),
            )
            .await
    }
}
