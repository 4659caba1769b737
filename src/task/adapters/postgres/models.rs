//! Diesel row models for task and outbox persistence.

use super::schema::{task_outbox, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Store-assigned task identifier.
    pub id: i64,
    /// Task title.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Scheduling priority.
    pub priority: String,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// First entry into `in_progress`.
    pub started_at: Option<DateTime<Utc>>,
    /// Entry into a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome summary recorded on completion.
    pub result: Option<String>,
    /// Failure or cancellation explanation.
    pub error_info: Option<String>,
}

/// Insert model for task records; the store assigns the identifier.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task title.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Scheduling priority.
    pub priority: String,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Changeset applied by status-transition updates.
///
/// `None` fields are skipped, so write-once columns are never nulled out.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskChangesRow {
    /// Lifecycle status.
    pub status: String,
    /// First entry into `in_progress`.
    pub started_at: Option<DateTime<Utc>>,
    /// Entry into a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Outcome summary recorded on completion.
    pub result: Option<String>,
    /// Failure or cancellation explanation.
    pub error_info: Option<String>,
}

/// Query result row for outbox entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = task_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxRow {
    /// Outbox entry identifier.
    pub id: i64,
    /// Referenced task identifier.
    pub task_id: i64,
    /// Wire priority attached at publish time.
    pub priority: i16,
    /// Serialized queue message payload.
    pub payload: String,
    /// Earliest time the entry may be (re)delivered.
    pub available_at: DateTime<Utc>,
    /// Number of deliveries so far.
    pub delivery_count: i32,
    /// Publication timestamp.
    pub enqueued_at: DateTime<Utc>,
}

/// Insert model for outbox entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_outbox)]
pub struct NewOutboxRow {
    /// Referenced task identifier.
    pub task_id: i64,
    /// Wire priority attached at publish time.
    pub priority: i16,
    /// Serialized queue message payload.
    pub payload: String,
    /// Earliest time the entry may be (re)delivered.
    pub available_at: DateTime<Utc>,
    /// Number of deliveries so far.
    pub delivery_count: i32,
    /// Publication timestamp.
    pub enqueued_at: DateTime<Utc>,
}
