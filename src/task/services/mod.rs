//! Application services for task lifecycle orchestration.

mod coordinator;
mod worker;

pub use coordinator::{
    CreateTaskRequest, TaskCoordinator, TaskCoordinatorError, TaskCoordinatorResult,
};
pub use worker::{DeliveryDisposition, WorkerLoop, WorkerLoopError};
