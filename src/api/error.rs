//! Surface-level error type with HTTP-equivalent status codes.

use crate::task::domain::{TaskDomainError, TaskId};
use crate::task::ports::PageBoundsError;
use crate::task::services::TaskCoordinatorError;
use thiserror::Error;

/// Error surfaced by the request layer.
///
/// State-machine conflicts (cancelling a running task, racing transitions)
/// map to 409 rather than 404: the record exists, the operation is merely
/// illegal in its current state.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request payload failed validation (422).
    #[error(transparent)]
    Validation(TaskDomainError),

    /// Pagination parameters out of bounds (422).
    #[error(transparent)]
    PageBounds(#[from] PageBoundsError),

    /// Task does not exist (404).
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Operation conflicts with the task's current lifecycle state (409).
    #[error("{0}")]
    Conflict(String),

    /// Credentials rejected by the authorizer (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Store or queue failure (500).
    #[error(transparent)]
    Internal(TaskCoordinatorError),
}

impl ApiError {
    /// Returns the HTTP-equivalent status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::PageBounds(_) => 422,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Internal(_) => 500,
        }
    }
}

impl From<TaskCoordinatorError> for ApiError {
    fn from(err: TaskCoordinatorError) -> Self {
        match err {
            TaskCoordinatorError::Validation(domain) => Self::Validation(domain),
            TaskCoordinatorError::PageBounds(bounds) => Self::PageBounds(bounds),
            TaskCoordinatorError::NotFound(id) => Self::NotFound(id),
            TaskCoordinatorError::IllegalTransition { .. }
            | TaskCoordinatorError::ConcurrentUpdate(_) => Self::Conflict(err.to_string()),
            other => Self::Internal(other),
        }
    }
}
