//! Port contracts for task lifecycle management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services:
//! the store, the work queue, and the unit-of-work executor.

pub mod executor;
pub mod queue;
pub mod repository;

pub use executor::{ExecutionError, TaskExecutor};
pub use queue::{
    Acknowledger, Delivery, TaskMessage, TaskQueue, TaskQueueError, TaskQueueResult, WirePriority,
};
pub use repository::{
    PageBoundsError, PageRequest, TaskFilter, TaskRepository, TaskRepositoryError,
    TaskRepositoryResult,
};
