//! Repository port for task persistence, lookup, and paginated listing.

use crate::task::domain::{NewTask, Task, TaskId, TaskPriority, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Filter applied to task listings; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Restrict to a single lifecycle status.
    pub status: Option<TaskStatus>,
    /// Restrict to a single priority.
    pub priority: Option<TaskPriority>,
}

/// Validated 1-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: u32,
    size: u32,
}

impl PageRequest {
    /// Smallest accepted page size.
    pub const MIN_SIZE: u32 = 1;
    /// Largest accepted page size.
    pub const MAX_SIZE: u32 = 100;

    /// Creates a validated pagination window.
    ///
    /// # Errors
    ///
    /// Returns [`PageBoundsError`] when the page number is zero or the size
    /// falls outside `1..=100`.
    pub const fn new(number: u32, size: u32) -> Result<Self, PageBoundsError> {
        if number == 0 {
            return Err(PageBoundsError::Number(number));
        }
        if size < Self::MIN_SIZE || size > Self::MAX_SIZE {
            return Err(PageBoundsError::Size(size));
        }
        Ok(Self { number, size })
    }

    /// Returns the 1-based page number.
    #[must_use]
    pub const fn number(self) -> u32 {
        self.number
    }

    /// Returns the page size.
    #[must_use]
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Returns the number of records preceding this page.
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.number as u64 - 1) * self.size as u64
    }

    /// Returns the total page count for `total` matching records.
    #[must_use]
    pub fn total_pages(self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.size))
    }
}

/// Rejected pagination parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageBoundsError {
    /// Page numbers are 1-based.
    #[error("page number must be at least 1, got {0}")]
    Number(u32),

    /// Page size must stay within the service bound.
    #[error("page size must be between 1 and 100, got {0}")]
    Size(u32),
}

/// Task persistence contract.
///
/// The store is the sole serialization point for record mutation: `update`
/// is a compare-and-swap on the previously observed status, so exactly one
/// of two racing transitions wins.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Persists a draft, assigning its identifier and creation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the store rejects
    /// the insert.
    async fn create(&self, new_task: &NewTask) -> TaskRepositoryResult<Task>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Persists task state, provided the stored status still equals
    /// `expected_status`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not
    /// exist and [`TaskRepositoryError::StaleStatus`] when a concurrent
    /// update changed the status since it was read.
    async fn update(&self, task: &Task, expected_status: TaskStatus) -> TaskRepositoryResult<()>;

    /// Returns one page of tasks matching `filter` plus the total match
    /// count before pagination.
    ///
    /// Ordering is `created_at` descending with `id` descending tie-break.
    async fn list(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> TaskRepositoryResult<(Vec<Task>, u64)>;

    /// Returns tasks still in `new` created at or before `cutoff`, oldest
    /// first (input to the stalled-publication sweep).
    async fn find_new_older_than(&self, cutoff: DateTime<Utc>) -> TaskRepositoryResult<Vec<Task>>;

    /// Round-trips the datastore, for liveness checks.
    async fn ping(&self) -> TaskRepositoryResult<()>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A concurrent update changed the task between read and write.
    #[error("stale status for task {task_id}: expected {expected}")]
    StaleStatus {
        /// Task whose update was rejected.
        task_id: TaskId,
        /// Status the caller observed before mutating.
        expected: TaskStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
