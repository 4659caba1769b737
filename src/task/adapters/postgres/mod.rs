//! `PostgreSQL` adapters for task persistence and durable queueing.

mod models;
mod queue;
mod repository;
mod schema;

pub use queue::PostgresTaskQueue;
pub use repository::{PostgresTaskRepository, TaskPgPool};
