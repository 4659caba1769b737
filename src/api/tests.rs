//! Surface tests: DTO shapes, status-code mapping, and the end-to-end
//! request scenarios.

use super::{
    ApiError, AuthorizationError, CreateTaskBody, ListTasksParams, PermitAllAuthorizer,
    RequestAuthorizer, TaskApi,
};
use crate::task::{
    adapters::memory::{InMemoryTaskQueue, InMemoryTaskRepository},
    domain::{CANCELLED_BY_USER, TaskId, TaskPriority, TaskStatus},
    services::TaskCoordinator,
};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;

type TestRepository = InMemoryTaskRepository<DefaultClock>;
type TestCoordinator = TaskCoordinator<TestRepository, InMemoryTaskQueue, DefaultClock>;
type TestApi<A> = TaskApi<TestRepository, InMemoryTaskQueue, DefaultClock, A>;

fn build_api<A: RequestAuthorizer>(authorizer: A) -> (TestApi<A>, Arc<TestCoordinator>) {
    let clock = Arc::new(DefaultClock);
    let repository = Arc::new(InMemoryTaskRepository::new(Arc::clone(&clock)));
    let queue = Arc::new(InMemoryTaskQueue::new());
    let coordinator = Arc::new(TaskCoordinator::new(repository, queue, clock));
    (TaskApi::new(Arc::clone(&coordinator), authorizer), coordinator)
}

#[fixture]
fn api() -> (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>) {
    build_api(PermitAllAuthorizer)
}

fn create_body(title: &str, priority: TaskPriority) -> CreateTaskBody {
    CreateTaskBody {
        title: title.to_owned(),
        description: None,
        priority,
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_task_representation_starts_in_new(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, _) = api;
    let body = CreateTaskBody {
        title: "T1".to_owned(),
        description: Some("First task".to_owned()),
        priority: TaskPriority::High,
    };

    let representation = api
        .create_task(None, body)
        .await
        .expect("creation should succeed");

    assert_eq!(representation.title, "T1");
    assert_eq!(representation.description.as_deref(), Some("First task"));
    assert_eq!(representation.priority, TaskPriority::High);
    assert_eq!(representation.status, TaskStatus::New);
    assert!(representation.started_at.is_none());
    assert!(representation.completed_at.is_none());
    assert!(representation.result.is_none());
    assert!(representation.error_info.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_title_maps_to_422(api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>)) {
    let (api, _) = api;
    let result = api
        .create_task(None, create_body("   ", TaskPriority::Medium))
        .await;
    let Err(err) = result else {
        panic!("empty title must be rejected");
    };
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(err.status_code(), 422);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn create_body_defaults_priority_to_medium() {
    let body: CreateTaskBody =
        serde_json::from_str("{\"title\": \"Defaulted\"}").expect("body should parse");
    assert_eq!(body.priority, TaskPriority::Medium);
    assert!(body.description.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_wire_priority_is_rejected_at_parse_time() {
    let result = serde_json::from_str::<CreateTaskBody>(
        "{\"title\": \"Bad priority\", \"priority\": \"urgent\"}",
    );
    assert!(result.is_err());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn listing_reports_pages_for_25_tasks(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, _) = api;
    for index in 0..25 {
        api.create_task(
            None,
            create_body(&format!("Task {index}"), TaskPriority::Medium),
        )
        .await
        .expect("creation should succeed");
    }

    let params = ListTasksParams {
        page: 2,
        size: 10,
        ..ListTasksParams::default()
    };
    let page = api
        .list_tasks(None, params)
        .await
        .expect("listing should succeed");

    assert_eq!(page.tasks.len(), 10);
    assert_eq!(page.total, 25);
    assert_eq!(page.page, 2);
    assert_eq!(page.size, 10);
    assert_eq!(page.pages, 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn out_of_bounds_pagination_maps_to_422(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, _) = api;
    for (page, size) in [(0, 10), (1, 0), (1, 101)] {
        let params = ListTasksParams {
            page,
            size,
            ..ListTasksParams::default()
        };
        let Err(err) = api.list_tasks(None, params).await else {
            panic!("page={page} size={size} must be rejected");
        };
        assert!(matches!(err, ApiError::PageBounds(_)));
        assert_eq!(err.status_code(), 422);
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_filter_returns_only_matching_tasks(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, coordinator) = api;
    let doomed = api
        .create_task(None, create_body("Will fail", TaskPriority::Medium))
        .await
        .expect("creation should succeed");
    api.create_task(None, create_body("Stays new", TaskPriority::Medium))
        .await
        .expect("creation should succeed");

    let doomed_id = TaskId::new(doomed.id);
    for status in [TaskStatus::Pending, TaskStatus::InProgress] {
        coordinator
            .update_status(doomed_id, status, None, None)
            .await
            .expect("transition should succeed");
    }
    coordinator
        .update_status(doomed_id, TaskStatus::Failed, None, Some("oom".to_owned()))
        .await
        .expect("failure should persist");

    let params = ListTasksParams {
        status: Some(TaskStatus::Failed),
        ..ListTasksParams::default()
    };
    let page = api
        .list_tasks(None, params)
        .await
        .expect("listing should succeed");
    assert_eq!(page.total, 1);
    assert!(page.tasks.iter().all(|task| task.status == TaskStatus::Failed));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_unknown_task_maps_to_404(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, _) = api;
    let Err(err) = api.get_task(None, 4040).await else {
        panic!("missing task must be a 404");
    };
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_then_get_shows_cancellation_outcome(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, _) = api;
    let created = api
        .create_task(None, create_body("Cancel me", TaskPriority::Low))
        .await
        .expect("creation should succeed");

    api.cancel_task(None, created.id)
        .await
        .expect("cancellation should succeed");

    let fetched = api
        .get_task(None, created.id)
        .await
        .expect("lookup should succeed");
    assert_eq!(fetched.status, TaskStatus::Cancelled);
    assert_eq!(fetched.error_info.as_deref(), Some(CANCELLED_BY_USER));
    assert!(fetched.completed_at.is_some());

    let status_view = api
        .get_task_status(None, created.id)
        .await
        .expect("status lookup should succeed");
    assert_eq!(status_view.task_id, created.id);
    assert_eq!(status_view.status, TaskStatus::Cancelled);
    assert!(status_view.completed_at.is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_running_task_maps_to_409(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, coordinator) = api;
    let created = api
        .create_task(None, create_body("Running", TaskPriority::Medium))
        .await
        .expect("creation should succeed");

    let id = TaskId::new(created.id);
    for status in [TaskStatus::Pending, TaskStatus::InProgress] {
        coordinator
            .update_status(id, status, None, None)
            .await
            .expect("transition should succeed");
    }

    let Err(err) = api.cancel_task(None, created.id).await else {
        panic!("cancelling a running task must conflict");
    };
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(err.status_code(), 409);

    let fetched = api
        .get_task(None, created.id)
        .await
        .expect("lookup should succeed");
    assert_eq!(fetched.status, TaskStatus::InProgress);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn health_reports_healthy_store(
    api: (TestApi<PermitAllAuthorizer>, Arc<TestCoordinator>),
) {
    let (api, _) = api;
    let report = api.health().await.expect("store should answer");
    assert_eq!(report.status, "healthy");
}

/// Authorizer that rejects everything, for exercising the capability seam.
struct DenyAllAuthorizer;

impl RequestAuthorizer for DenyAllAuthorizer {
    fn authorize(&self, _credentials: Option<&str>) -> Result<(), AuthorizationError> {
        Err(AuthorizationError::new("no anonymous access"))
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_map_to_401() {
    let (api, _) = build_api(DenyAllAuthorizer);
    let Err(err) = api
        .create_task(Some("bad-token"), create_body("Nope", TaskPriority::Medium))
        .await
    else {
        panic!("denied request must be unauthorized");
    };
    assert!(matches!(err, ApiError::Unauthorized(_)));
    assert_eq!(err.status_code(), 401);
}
