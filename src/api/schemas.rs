//! Request and response DTOs for the task surface.

use crate::task::domain::{Task, TaskPriority, TaskStatus};
use crate::task::ports::PageRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const fn default_page() -> u32 {
    1
}

const fn default_size() -> u32 {
    10
}

fn default_priority() -> TaskPriority {
    TaskPriority::default()
}

/// Body of a task creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskBody {
    /// Task title; validated by the domain (non-empty, at most 255 chars).
    pub title: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Scheduling priority; `medium` when omitted.
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
}

/// Query parameters of a task listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTasksParams {
    /// Restrict to a single lifecycle status.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Restrict to a single priority.
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page size, bounded `1..=100`.
    #[serde(default = "default_size")]
    pub size: u32,
}

impl Default for ListTasksParams {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            page: default_page(),
            size: default_size(),
        }
    }
}

/// Full task representation returned by create/get/list operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRepresentation {
    /// Store-assigned identifier.
    pub id: i64,
    /// Task title.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Creation timestamp.
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

impl From<&Task> for TaskRepresentation {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id().into_inner(),
            title: task.title().as_str().to_owned(),
            description: task.description().map(ToOwned::to_owned),
            priority: task.priority(),
            status: task.status(),
            created_at: task.created_at(),
            started_at: task.started_at(),
            completed_at: task.completed_at(),
            result: task.result().map(ToOwned::to_owned),
            error_info: task.error_info().map(ToOwned::to_owned),
        }
    }
}

/// One page of a task listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListPage {
    /// Tasks on this page, newest first.
    pub tasks: Vec<TaskRepresentation>,
    /// Total matching tasks before pagination.
    pub total: u64,
    /// 1-based page number served.
    pub page: u32,
    /// Page size served.
    pub size: u32,
    /// Total page count for `total` and `size`.
    pub pages: u64,
}

impl TaskListPage {
    /// Assembles a page from coordinator output.
    #[must_use]
    pub fn assemble(tasks: &[Task], total: u64, page: PageRequest) -> Self {
        Self {
            tasks: tasks.iter().map(TaskRepresentation::from).collect(),
            total,
            page: page.number(),
            size: page.size(),
            pages: page.total_pages(total),
        }
    }
}

/// Compact status view of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusRepresentation {
    /// Store-assigned identifier.
    pub task_id: i64,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// First entry into `in_progress`, if reached.
    pub started_at: Option<DateTime<Utc>>,
    /// Entry into a terminal status, if reached.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskStatusRepresentation {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id().into_inner(),
            status: task.status(),
            created_at: task.created_at(),
            started_at: task.started_at(),
            completed_at: task.completed_at(),
        }
    }
}

/// Service liveness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"healthy"` when the store answers.
    pub status: String,
}

impl HealthReport {
    /// The healthy report.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_owned(),
        }
    }
}
