//! Handler service translating surface calls into coordinator operations.

use super::{
    error::ApiError,
    schemas::{
        CreateTaskBody, HealthReport, ListTasksParams, TaskListPage, TaskRepresentation,
        TaskStatusRepresentation,
    },
};
use crate::task::{
    domain::TaskId,
    ports::{PageRequest, TaskFilter, TaskQueue, TaskRepository},
    services::{CreateTaskRequest, TaskCoordinator},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Rejected request credentials.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct AuthorizationError {
    reason: String,
}

impl AuthorizationError {
    /// Creates an authorization error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Capability consulted before any coordinator invocation.
///
/// Authentication is pluggable and deliberately outside the state machine;
/// implementations decide what, if anything, the bearer credentials mean.
pub trait RequestAuthorizer: Send + Sync {
    /// Validates the caller's credentials, if any were presented.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] when the request must be rejected.
    fn authorize(&self, credentials: Option<&str>) -> Result<(), AuthorizationError>;
}

/// Authorizer that admits every request, authenticated or anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAllAuthorizer;

impl RequestAuthorizer for PermitAllAuthorizer {
    fn authorize(&self, _credentials: Option<&str>) -> Result<(), AuthorizationError> {
        Ok(())
    }
}

/// Surface handler service over a task coordinator.
#[derive(Clone)]
pub struct TaskApi<R, Q, C, A>
where
    R: TaskRepository,
    Q: TaskQueue,
    C: Clock + Send + Sync,
    A: RequestAuthorizer,
{
    coordinator: Arc<TaskCoordinator<R, Q, C>>,
    authorizer: A,
}

impl<R, Q, C, A> TaskApi<R, Q, C, A>
where
    R: TaskRepository,
    Q: TaskQueue,
    C: Clock + Send + Sync,
    A: RequestAuthorizer,
{
    /// Creates a surface service over `coordinator`.
    #[must_use]
    pub const fn new(coordinator: Arc<TaskCoordinator<R, Q, C>>, authorizer: A) -> Self {
        Self {
            coordinator,
            authorizer,
        }
    }

    /// `POST /tasks`: submits a new task (201 on success).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for rejected payloads and
    /// [`ApiError::Internal`] when persistence fails.
    pub async fn create_task(
        &self,
        credentials: Option<&str>,
        body: CreateTaskBody,
    ) -> Result<TaskRepresentation, ApiError> {
        self.authorize(credentials)?;
        let mut request = CreateTaskRequest::new(body.title).with_priority(body.priority);
        if let Some(description) = body.description {
            request = request.with_description(description);
        }
        let task = self.coordinator.create_task(request).await?;
        Ok(TaskRepresentation::from(&task))
    }

    /// `GET /tasks`: lists tasks with filtering and pagination.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PageBounds`] for out-of-bounds pagination
    /// parameters.
    pub async fn list_tasks(
        &self,
        credentials: Option<&str>,
        params: ListTasksParams,
    ) -> Result<TaskListPage, ApiError> {
        self.authorize(credentials)?;
        let page = PageRequest::new(params.page, params.size)?;
        let filter = TaskFilter {
            status: params.status,
            priority: params.priority,
        };
        let (tasks, total) = self.coordinator.list_tasks(filter, page).await?;
        Ok(TaskListPage::assemble(&tasks, total, page))
    }

    /// `GET /tasks/{id}`: returns one task.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the task does not exist.
    pub async fn get_task(
        &self,
        credentials: Option<&str>,
        task_id: i64,
    ) -> Result<TaskRepresentation, ApiError> {
        self.authorize(credentials)?;
        let task = self.coordinator.get_task(TaskId::new(task_id)).await?;
        Ok(TaskRepresentation::from(&task))
    }

    /// `GET /tasks/{id}/status`: returns the compact status view.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the task does not exist.
    pub async fn get_task_status(
        &self,
        credentials: Option<&str>,
        task_id: i64,
    ) -> Result<TaskStatusRepresentation, ApiError> {
        self.authorize(credentials)?;
        let task = self.coordinator.get_task(TaskId::new(task_id)).await?;
        Ok(TaskStatusRepresentation::from(&task))
    }

    /// `DELETE /tasks/{id}`: cancels a not-yet-running task (204 on
    /// success; this is cancel semantics, not physical deletion).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the task does not exist and
    /// [`ApiError::Conflict`] when it is executing or already terminal.
    pub async fn cancel_task(
        &self,
        credentials: Option<&str>,
        task_id: i64,
    ) -> Result<(), ApiError> {
        self.authorize(credentials)?;
        self.coordinator.cancel_task(TaskId::new(task_id)).await?;
        Ok(())
    }

    /// `GET /health`: store-backed liveness probe.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] when the store does not answer.
    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        self.coordinator.ping().await?;
        Ok(HealthReport::healthy())
    }

    fn authorize(&self, credentials: Option<&str>) -> Result<(), ApiError> {
        self.authorizer
            .authorize(credentials)
            .map_err(|err| ApiError::Unauthorized(err.to_string()))
    }
}
