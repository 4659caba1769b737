//! In-memory repository for task lifecycle tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{NewTask, PersistedTaskData, Task, TaskId, TaskStatus},
    ports::{PageRequest, TaskFilter, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
///
/// Identifiers are assigned from a monotonic counter, mirroring the store's
/// sequence-assigned primary key.
#[derive(Debug, Clone)]
pub struct InMemoryTaskRepository<C> {
    state: Arc<RwLock<InMemoryTaskState>>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    next_id: i64,
}

impl<C> InMemoryTaskRepository<C> {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryTaskState {
                tasks: HashMap::new(),
                next_id: 1,
            })),
            clock,
        }
    }
}

fn matches_filter(task: &Task, filter: TaskFilter) -> bool {
    filter.status.is_none_or(|status| task.status() == status)
        && filter
            .priority
            .is_none_or(|priority| task.priority() == priority)
}

/// Sorts listings by `created_at` descending, `id` descending on ties.
fn listing_order(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

#[async_trait]
impl<C> TaskRepository for InMemoryTaskRepository<C>
where
    C: Clock + Send + Sync,
{
    async fn create(&self, new_task: &NewTask) -> TaskRepositoryResult<Task> {
        let mut state = self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let id = TaskId::new(state.next_id);
        state.next_id += 1;

        let task = Task::from_persisted(PersistedTaskData {
            id,
            title: new_task.title().clone(),
            description: new_task.description().map(ToOwned::to_owned),
            priority: new_task.priority(),
            status: TaskStatus::New,
            created_at: self.clock.utc(),
            started_at: None,
            completed_at: None,
            result: None,
            error_info: None,
        });
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task, expected_status: TaskStatus) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if stored.status() != expected_status {
            return Err(TaskRepositoryError::StaleStatus {
                task_id: task.id(),
                expected: expected_status,
            });
        }
        *stored = task.clone();
        Ok(())
    }

    async fn list(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> TaskRepositoryResult<(Vec<Task>, u64)> {
        let state = self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        let mut matching: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| matches_filter(task, filter))
            .cloned()
            .collect();
        listing_order(&mut matching);

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let window: Vec<Task> = matching
            .into_iter()
            .skip(offset)
            .take(page.size() as usize)
            .collect();
        Ok((window, total))
    }

    async fn find_new_older_than(&self, cutoff: DateTime<Utc>) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })?;

        let mut stalled: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| task.status() == TaskStatus::New && task.created_at() <= cutoff)
            .cloned()
            .collect();
        stalled.sort_by_key(Task::created_at);
        Ok(stalled)
    }

    async fn ping(&self) -> TaskRepositoryResult<()> {
        self.state
            .read()
            .map(|_| ())
            .map_err(|err| TaskRepositoryError::persistence(std::io::Error::other(err.to_string())))
    }
}
