//! Service tests for task coordination: persist-then-publish, listing
//! policy, cancellation, and worker-facing status updates.

use crate::task::{
    adapters::memory::{InMemoryTaskQueue, InMemoryTaskRepository},
    domain::{CANCELLED_BY_USER, TaskId, TaskPriority, TaskStatus},
    ports::{
        Delivery, PageRequest, TaskFilter, TaskMessage, TaskQueue, TaskQueueError,
        TaskQueueResult, TaskRepository, WirePriority,
    },
    services::{CreateTaskRequest, TaskCoordinator, TaskCoordinatorError},
};
use chrono::TimeDelta;
use mockable::DefaultClock;
use mockall::mock;
use rstest::{fixture, rstest};
use std::sync::Arc;

type TestRepository = InMemoryTaskRepository<DefaultClock>;
type TestCoordinator = TaskCoordinator<TestRepository, InMemoryTaskQueue, DefaultClock>;

struct Harness {
    coordinator: TestCoordinator,
    queue: Arc<InMemoryTaskQueue>,
}

#[fixture]
fn harness() -> Harness {
    let clock = Arc::new(DefaultClock);
    let repository = Arc::new(InMemoryTaskRepository::new(Arc::clone(&clock)));
    let queue = Arc::new(InMemoryTaskQueue::new());
    let coordinator = TaskCoordinator::new(repository, Arc::clone(&queue), clock);
    Harness { coordinator, queue }
}

mock! {
    Queue {}

    #[async_trait::async_trait]
    impl TaskQueue for Queue {
        async fn publish(
            &self,
            message: &TaskMessage,
            priority: WirePriority,
        ) -> TaskQueueResult<()>;
        async fn receive(&self) -> TaskQueueResult<Delivery>;
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_persists_new_task_and_publishes_message(harness: Harness) {
    let request = CreateTaskRequest::new("Resize uploaded images")
        .with_description("Batch resize for the gallery")
        .with_priority(TaskPriority::High);

    let task = harness
        .coordinator
        .create_task(request)
        .await
        .expect("task creation should succeed");

    assert_eq!(task.status(), TaskStatus::New);
    assert_eq!(task.title().as_str(), "Resize uploaded images");
    assert!(task.started_at().is_none());
    assert!(task.completed_at().is_none());
    assert_eq!(harness.queue.ready_len(), 1);

    let delivery = harness.queue.receive().await.expect("delivery expected");
    let message =
        TaskMessage::from_bytes(delivery.payload()).expect("payload should decode");
    assert_eq!(message.task_id(), task.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_rejects_invalid_titles(harness: Harness) {
    let empty = harness
        .coordinator
        .create_task(CreateTaskRequest::new("   "))
        .await;
    assert!(matches!(empty, Err(TaskCoordinatorError::Validation(_))));

    let overlong = harness
        .coordinator
        .create_task(CreateTaskRequest::new("x".repeat(300)))
        .await;
    assert!(matches!(overlong, Err(TaskCoordinatorError::Validation(_))));
    assert_eq!(harness.queue.ready_len(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_retains_task_when_publication_fails() {
    let clock = Arc::new(DefaultClock);
    let repository = Arc::new(InMemoryTaskRepository::new(Arc::clone(&clock)));

    let mut queue = MockQueue::new();
    queue.expect_publish().returning(|_, _| {
        Err(TaskQueueError::transport(std::io::Error::other(
            "broker unavailable",
        )))
    });

    let coordinator =
        TaskCoordinator::new(Arc::clone(&repository), Arc::new(queue), clock);
    let task = coordinator
        .create_task(CreateTaskRequest::new("Survives broker outage"))
        .await
        .expect("publish failure must not fail creation");

    // The record stays visible in `new`; the sweep re-drives it later.
    let stored = repository
        .find_by_id(task.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored.map(|t| t.status()), Some(TaskStatus::New));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listing_paginates_with_total_before_pagination(harness: Harness) {
    for index in 0..25 {
        harness
            .coordinator
            .create_task(CreateTaskRequest::new(format!("Task {index}")))
            .await
            .expect("task creation should succeed");
    }

    let page = PageRequest::new(2, 10).expect("valid page");
    let (tasks, total) = harness
        .coordinator
        .list_tasks(TaskFilter::default(), page)
        .await
        .expect("listing should succeed");

    assert_eq!(tasks.len(), 10);
    assert_eq!(total, 25);
    assert_eq!(page.total_pages(total), 3);

    let beyond = PageRequest::new(4, 10).expect("valid page");
    let (rest, rest_total) = harness
        .coordinator
        .list_tasks(TaskFilter::default(), beyond)
        .await
        .expect("listing should succeed");
    assert!(rest.is_empty());
    assert_eq!(rest_total, 25);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listing_filter_returns_subset(harness: Harness) {
    for priority in [TaskPriority::Low, TaskPriority::High, TaskPriority::High] {
        harness
            .coordinator
            .create_task(CreateTaskRequest::new("Filtered").with_priority(priority))
            .await
            .expect("task creation should succeed");
    }

    let filter = TaskFilter {
        status: None,
        priority: Some(TaskPriority::High),
    };
    let page = PageRequest::new(1, 10).expect("valid page");
    let (high_only, total) = harness
        .coordinator
        .list_tasks(filter, page)
        .await
        .expect("listing should succeed");

    assert_eq!(total, 2);
    assert!(high_only.iter().all(|task| task.priority() == TaskPriority::High));

    let (all, all_total) = harness
        .coordinator
        .list_tasks(TaskFilter::default(), page)
        .await
        .expect("listing should succeed");
    assert_eq!(all_total, 3);
    assert!(high_only.iter().all(|task| all.iter().any(|t| t.id() == task.id())));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_unknown_task_is_not_found(harness: Harness) {
    let result = harness.coordinator.get_task(TaskId::new(404)).await;
    assert!(matches!(
        result,
        Err(TaskCoordinatorError::NotFound(id)) if id == TaskId::new(404)
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_new_task_records_cancellation(harness: Harness) {
    let task = harness
        .coordinator
        .create_task(CreateTaskRequest::new("Cancel me"))
        .await
        .expect("task creation should succeed");

    let cancelled = harness
        .coordinator
        .cancel_task(task.id())
        .await
        .expect("cancellation should succeed");
    assert_eq!(cancelled.status(), TaskStatus::Cancelled);
    assert_eq!(cancelled.error_info(), Some(CANCELLED_BY_USER));
    assert!(cancelled.completed_at().is_some());

    let stored = harness
        .coordinator
        .get_task(task.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored.status(), TaskStatus::Cancelled);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_running_task_is_a_conflict(harness: Harness) {
    let task = harness
        .coordinator
        .create_task(CreateTaskRequest::new("Already running"))
        .await
        .expect("task creation should succeed");
    harness
        .coordinator
        .update_status(task.id(), TaskStatus::Pending, None, None)
        .await
        .expect("pickup should succeed");
    harness
        .coordinator
        .update_status(task.id(), TaskStatus::InProgress, None, None)
        .await
        .expect("start should succeed");

    let result = harness.coordinator.cancel_task(task.id()).await;
    assert!(matches!(
        result,
        Err(TaskCoordinatorError::IllegalTransition {
            from: TaskStatus::InProgress,
            to: TaskStatus::Cancelled,
            ..
        })
    ));

    let stored = harness
        .coordinator
        .get_task(task.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored.status(), TaskStatus::InProgress);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn illegal_status_update_is_rejected_not_ignored(harness: Harness) {
    let task = harness
        .coordinator
        .create_task(CreateTaskRequest::new("No shortcuts"))
        .await
        .expect("task creation should succeed");

    // new -> completed skips the table entirely.
    let result = harness
        .coordinator
        .update_status(task.id(), TaskStatus::Completed, Some("done".to_owned()), None)
        .await;
    assert!(matches!(
        result,
        Err(TaskCoordinatorError::IllegalTransition {
            from: TaskStatus::New,
            to: TaskStatus::Completed,
            ..
        })
    ));

    let stored = harness
        .coordinator
        .get_task(task.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored.status(), TaskStatus::New);
    assert!(stored.result().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn settled_task_is_immune_to_further_updates(harness: Harness) {
    let task = harness
        .coordinator
        .create_task(CreateTaskRequest::new("Settled"))
        .await
        .expect("task creation should succeed");
    for status in [TaskStatus::Pending, TaskStatus::InProgress] {
        harness
            .coordinator
            .update_status(task.id(), status, None, None)
            .await
            .expect("transition should succeed");
    }
    let settled = harness
        .coordinator
        .update_status(
            task.id(),
            TaskStatus::Completed,
            Some("first outcome".to_owned()),
            None,
        )
        .await
        .expect("completion should succeed");

    let replay = harness
        .coordinator
        .update_status(
            task.id(),
            TaskStatus::Completed,
            Some("second outcome".to_owned()),
            None,
        )
        .await;
    assert!(matches!(
        replay,
        Err(TaskCoordinatorError::IllegalTransition { .. })
    ));

    let stored = harness
        .coordinator
        .get_task(task.id())
        .await
        .expect("lookup should succeed");
    assert_eq!(stored.result(), Some("first outcome"));
    assert_eq!(stored.completed_at(), settled.completed_at());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn republish_stalled_requeues_only_old_new_tasks(harness: Harness) {
    let stalled = harness
        .coordinator
        .create_task(CreateTaskRequest::new("Lost publication"))
        .await
        .expect("task creation should succeed");
    let cancelled = harness
        .coordinator
        .create_task(CreateTaskRequest::new("Settled before sweep"))
        .await
        .expect("task creation should succeed");
    harness
        .coordinator
        .cancel_task(cancelled.id())
        .await
        .expect("cancellation should succeed");

    // Simulate both creation-time messages being lost downstream.
    while harness.queue.ready_len() > 0 {
        let delivery = harness.queue.receive().await.expect("delivery expected");
        delivery.ack().await.expect("ack should succeed");
    }

    let republished = harness
        .coordinator
        .republish_stalled(TimeDelta::zero())
        .await
        .expect("sweep should succeed");
    assert_eq!(republished, 1);
    assert_eq!(harness.queue.ready_len(), 1);

    let delivery = harness.queue.receive().await.expect("delivery expected");
    let message = TaskMessage::from_bytes(delivery.payload()).expect("payload should decode");
    assert_eq!(message.task_id(), stalled.id());

    // Nothing is old enough for a one-hour threshold.
    let none = harness
        .coordinator
        .republish_stalled(TimeDelta::hours(1))
        .await
        .expect("sweep should succeed");
    assert_eq!(none, 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ping_reaches_the_store(harness: Harness) {
    harness.coordinator.ping().await.expect("store should answer");
}
