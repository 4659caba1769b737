//! Conveyor: task submission and asynchronous processing service.
//!
//! Clients submit named tasks with a priority; the service persists them,
//! publishes them to a durable work queue, and a worker pool consumes and
//! executes them, updating status as it progresses.
//!
//! # Architecture
//!
//! Conveyor follows hexagonal architecture principles:
//!
//! - **Domain**: the task lifecycle state machine, with no infrastructure
//!   dependencies
//! - **Ports**: abstract trait interfaces for the store, queue, and executor
//! - **Adapters**: concrete implementations of ports (`PostgreSQL`,
//!   in-memory, simulated execution)
//!
//! # Modules
//!
//! - [`task`]: task records, the lifecycle state machine, the coordinator,
//!   and the worker loop
//! - [`api`]: thin request surface over the coordinator
//! - [`config`]: explicit runtime settings

pub mod api;
pub mod config;
pub mod task;
