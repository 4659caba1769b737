//! Request surface: thin translation from external calls to coordinator
//! operations.
//!
//! This layer owns nothing but DTO shapes, error-to-status mapping, and the
//! pluggable authorization capability; every business rule lives behind the
//! [`crate::task::services::TaskCoordinator`] it wraps. The operation set
//! mirrors the HTTP contract (`POST /tasks`, `GET /tasks`, `GET
//! /tasks/{id}`, `GET /tasks/{id}/status`, `DELETE /tasks/{id}`, `GET
//! /health`) without binding a specific HTTP framework.

mod error;
mod schemas;
mod service;

pub use error::ApiError;
pub use schemas::{
    CreateTaskBody, HealthReport, ListTasksParams, TaskListPage, TaskRepresentation,
    TaskStatusRepresentation,
};
pub use service::{AuthorizationError, PermitAllAuthorizer, RequestAuthorizer, TaskApi};

#[cfg(test)]
mod tests;
