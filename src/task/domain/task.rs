//! Task aggregate root and the lifecycle state machine.

use super::{ParseTaskPriorityError, ParseTaskStatusError, TaskDomainError, TaskId, TaskTitle};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Explanation recorded in `error_info` on user-initiated cancellation.
pub const CANCELLED_BY_USER: &str = "Task cancelled by user";

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has been persisted but not yet picked up by a worker.
    New,
    /// A worker has claimed the task's queue message.
    Pending,
    /// The task's unit of work is executing.
    InProgress,
    /// Execution finished successfully.
    Completed,
    /// Execution failed or timed out.
    Failed,
    /// The task was cancelled before execution started.
    Cancelled,
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::New,
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Returns the canonical storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether the lifecycle table permits moving to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::New, Self::Pending | Self::Cancelled)
                | (Self::Pending, Self::InProgress | Self::Cancelled)
                | (Self::InProgress, Self::Completed | Self::Failed)
        )
    }

    /// Returns whether this status is absorbing.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "new" => Ok(Self::New),
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority attached to a task at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Served after all other work.
    Low,
    /// Default priority.
    Medium,
    /// Served before other work.
    High,
}

impl TaskPriority {
    /// Every priority, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Returns the canonical storage and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TryFrom<&str> for TaskPriority {
    type Error = ParseTaskPriorityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseTaskPriorityError(value.to_owned())),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated draft of a task awaiting persistence.
///
/// The store assigns the identifier and creation timestamp, so a draft
/// carries only caller-supplied fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    title: TaskTitle,
    description: Option<String>,
    priority: TaskPriority,
}

impl NewTask {
    /// Creates a draft from already-validated parts.
    #[must_use]
    pub const fn new(title: TaskTitle, description: Option<String>, priority: TaskPriority) -> Self {
        Self {
            title,
            description,
            priority,
        }
    }

    /// Returns the task title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Returns the optional free-text description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: TaskTitle,
    description: Option<String>,
    priority: TaskPriority,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<String>,
    error_info: Option<String>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Store-assigned task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: TaskTitle,
    /// Persisted description, if any.
    pub description: Option<String>,
    /// Persisted priority.
    pub priority: TaskPriority,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Store-stamped creation timestamp.
    pub created_at: DateTime<Utc>,
    /// First entry into `in_progress`, if reached.
    pub started_at: Option<DateTime<Utc>>,
    /// Entry into a terminal status, if reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome summary recorded on completion.
    pub result: Option<String>,
    /// Failure or cancellation explanation.
    pub error_info: Option<String>,
}

impl Task {
    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            description: data.description,
            priority: data.priority,
            status: data.status,
            created_at: data.created_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
            result: data.result,
            error_info: data.error_info,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Returns the current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when execution first started, if it has.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the task reached a terminal status, if it has.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the outcome summary recorded on completion.
    #[must_use]
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Returns the failure or cancellation explanation.
    #[must_use]
    pub fn error_info(&self) -> Option<&str> {
        self.error_info.as_deref()
    }

    /// Marks the task as claimed by a worker.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] when the task is
    /// not in `new`.
    pub fn mark_pending(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Pending, clock)
    }

    /// Marks the task as executing, stamping `started_at` on first entry.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] when the task is
    /// not in `pending`.
    pub fn start(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::InProgress, clock)
    }

    /// Records successful execution, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] when the task is
    /// not in `in_progress`. The outcome fields are untouched on rejection.
    pub fn complete(
        &mut self,
        result: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Completed, clock)?;
        self.result = result;
        Ok(())
    }

    /// Records failed execution, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] when the task is
    /// not in `in_progress`. The outcome fields are untouched on rejection.
    pub fn fail(
        &mut self,
        error_info: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Failed, clock)?;
        self.error_info = error_info;
        Ok(())
    }

    /// Cancels the task before execution, stamping `completed_at` and
    /// recording [`CANCELLED_BY_USER`].
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] when the task is
    /// not in `new` or `pending`; cancellation never preempts execution.
    pub fn cancel(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition(TaskStatus::Cancelled, clock)?;
        self.error_info = Some(CANCELLED_BY_USER.to_owned());
        Ok(())
    }

    /// Applies a validated transition and its timestamp side effects.
    ///
    /// `started_at` and `completed_at` are stamped at most once; redelivered
    /// work can re-enter this method without moving either timestamp.
    fn transition(&mut self, to: TaskStatus, clock: &impl Clock) -> Result<(), TaskDomainError> {
        if !self.status.can_transition_to(to) {
            return Err(TaskDomainError::InvalidStatusTransition {
                task_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        if to == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(clock.utc());
        }
        if to.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(clock.utc());
        }
        Ok(())
    }
}
