//! Queue port for durable, priority-aware task message delivery.
//!
//! The broker behind this port guarantees at-least-once delivery: a message
//! stays on the queue until its [`Delivery`] is acknowledged, and a crashed
//! or nacked delivery is handed to another consumer.

use crate::task::domain::{TaskId, TaskPriority};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task queue operations.
pub type TaskQueueResult<T> = Result<T, TaskQueueError>;

/// JSON payload carried by every task queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Identifier of the task to process.
    pub task_id: i64,
}

impl TaskMessage {
    /// Creates a message referencing `task_id`.
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self {
            task_id: task_id.into_inner(),
        }
    }

    /// Returns the referenced task identifier.
    #[must_use]
    pub const fn task_id(self) -> TaskId {
        TaskId::new(self.task_id)
    }

    /// Decodes a message from raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying decode error when the payload is not a valid
    /// task message; such payloads are discarded, not retried.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Broker-facing delivery priority on a 1-10 scale; higher is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WirePriority(u8);

impl WirePriority {
    /// Lowest wire priority.
    pub const MIN: Self = Self(1);
    /// Highest wire priority.
    pub const MAX: Self = Self(10);

    /// Returns the numeric priority value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<TaskPriority> for WirePriority {
    fn from(priority: TaskPriority) -> Self {
        match priority {
            TaskPriority::Low => Self(1),
            TaskPriority::Medium => Self(5),
            TaskPriority::High => Self(10),
        }
    }
}

/// One received message together with its acknowledgement handle.
///
/// A delivery must end in exactly one of [`ack`](Self::ack) (outcome durably
/// persisted, remove the message) or [`nack`](Self::nack) (processing could
/// not complete, return the message for redelivery).
pub struct Delivery {
    payload: Vec<u8>,
    redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Assembles a delivery from adapter parts.
    #[must_use]
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    /// Returns the raw message payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns whether the broker has delivered this message before.
    #[must_use]
    pub const fn redelivered(&self) -> bool {
        self.redelivered
    }

    /// Permanently removes the message from the queue.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Transport`] when the broker rejects the
    /// acknowledgement; the message will be redelivered.
    pub async fn ack(self) -> TaskQueueResult<()> {
        self.acker.ack().await
    }

    /// Returns the message to the queue for redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Transport`] when the broker rejects the
    /// negative acknowledgement; the broker's lease expiry still redelivers.
    pub async fn nack(self) -> TaskQueueResult<()> {
        self.acker.nack().await
    }
}

/// Adapter-side completion contract for a single delivery.
#[async_trait]
pub trait Acknowledger: Send {
    /// Permanently removes the message from the queue.
    async fn ack(self: Box<Self>) -> TaskQueueResult<()>;

    /// Returns the message to the queue for redelivery.
    async fn nack(self: Box<Self>) -> TaskQueueResult<()>;
}

/// Durable task message channel contract.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publishes a message at the given wire priority with durable delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError`] when the payload cannot be encoded or the
    /// broker rejects the publication.
    async fn publish(&self, message: &TaskMessage, priority: WirePriority) -> TaskQueueResult<()>;

    /// Waits for and claims the next available message, highest wire
    /// priority first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskQueueError::Transport`] when the broker connection
    /// fails.
    async fn receive(&self) -> TaskQueueResult<Delivery>;
}

/// Errors returned by task queue implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskQueueError {
    /// The message payload could not be encoded.
    #[error("failed to encode queue payload: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    /// Broker transport failure.
    #[error("queue transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskQueueError {
    /// Wraps a payload encoding error.
    #[must_use]
    pub fn encode(err: serde_json::Error) -> Self {
        Self::Encode(Arc::new(err))
    }

    /// Wraps a broker transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
