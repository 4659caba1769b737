//! Task lifecycle management for Conveyor.
//!
//! This module implements task submission, the lifecycle state machine, and
//! the coordination protocol between the store and the work queue: tasks are
//! persisted first and published second, workers drive records through
//! validated transitions, and queue messages are acknowledged only once
//! their outcome is durable. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
