//! In-memory priority queue with at-least-once delivery semantics.

use async_trait::async_trait;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::task::ports::{
    Acknowledger, Delivery, TaskMessage, TaskQueue, TaskQueueError, TaskQueueResult, WirePriority,
};

/// Thread-safe in-memory task queue.
///
/// Messages are served highest wire priority first, FIFO within a priority
/// class. A received message is parked in-flight until it is acked (removed)
/// or nacked (requeued as a redelivery), matching the at-least-once contract
/// of a durable broker.
#[derive(Clone, Default)]
pub struct InMemoryTaskQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    ready: BinaryHeap<QueuedMessage>,
    in_flight: HashMap<u64, QueuedMessage>,
}

#[derive(Clone)]
struct QueuedMessage {
    priority: u8,
    seq: u64,
    payload: Vec<u8>,
    redelivered: bool,
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedMessage {}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedMessage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority wins, then lower sequence (older first).
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl InMemoryTaskQueue {
    /// Creates an empty in-memory queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of messages waiting for delivery.
    #[must_use]
    pub fn ready_len(&self) -> usize {
        self.state.lock().map(|state| state.ready.len()).unwrap_or(0)
    }

    /// Returns the number of delivered-but-unacknowledged messages.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.in_flight.len())
            .unwrap_or(0)
    }

    fn pop_ready(&self) -> TaskQueueResult<Option<(u64, QueuedMessage)>> {
        let mut state = self
            .state
            .lock()
            .map_err(|err| TaskQueueError::transport(std::io::Error::other(err.to_string())))?;
        let Some(message) = state.ready.pop() else {
            return Ok(None);
        };
        let tag = message.seq;
        state.in_flight.insert(tag, message.clone());
        Ok(Some((tag, message)))
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn publish(&self, message: &TaskMessage, priority: WirePriority) -> TaskQueueResult<()> {
        let payload = serde_json::to_vec(message).map_err(TaskQueueError::encode)?;
        let mut state = self
            .state
            .lock()
            .map_err(|err| TaskQueueError::transport(std::io::Error::other(err.to_string())))?;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.ready.push(QueuedMessage {
            priority: priority.value(),
            seq,
            payload,
            redelivered: false,
        });
        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self) -> TaskQueueResult<Delivery> {
        loop {
            // Register for wakeup before checking, so a publish racing with
            // the check cannot be missed.
            let notified = self.notify.notified();
            if let Some((tag, message)) = self.pop_ready()? {
                let acker = InMemoryAcker {
                    state: Arc::clone(&self.state),
                    notify: Arc::clone(&self.notify),
                    tag,
                };
                return Ok(Delivery::new(
                    message.payload,
                    message.redelivered,
                    Box::new(acker),
                ));
            }
            notified.await;
        }
    }
}

struct InMemoryAcker {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    tag: u64,
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(self: Box<Self>) -> TaskQueueResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|err| TaskQueueError::transport(std::io::Error::other(err.to_string())))?;
        state.in_flight.remove(&self.tag);
        Ok(())
    }

    async fn nack(self: Box<Self>) -> TaskQueueResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|err| TaskQueueError::transport(std::io::Error::other(err.to_string())))?;
        if let Some(mut message) = state.in_flight.remove(&self.tag) {
            message.redelivered = true;
            state.ready.push(message);
        }
        drop(state);
        self.notify.notify_one();
        Ok(())
    }
}
