//! `PostgreSQL` repository implementation for task lifecycle storage.

use super::{
    models::{NewTaskRow, TaskChangesRow, TaskRow},
    schema::tasks,
};
use crate::task::{
    domain::{
        NewTask, PersistedTaskData, Task, TaskId, TaskPriority, TaskStatus, TaskTitle,
    },
    ports::{PageRequest, TaskFilter, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::Clock;
use std::sync::Arc;

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository<C> {
    pool: TaskPgPool,
    clock: Arc<C>,
}

impl<C> PostgresTaskRepository<C> {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool, clock: Arc<C>) -> Self {
        Self { pool, clock }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

/// Status values matched by a filter; all of them when unfiltered.
fn status_values(filter: TaskFilter) -> Vec<&'static str> {
    filter.status.map_or_else(
        || TaskStatus::ALL.map(TaskStatus::as_str).to_vec(),
        |status| vec![status.as_str()],
    )
}

/// Priority values matched by a filter; all of them when unfiltered.
fn priority_values(filter: TaskFilter) -> Vec<&'static str> {
    filter.priority.map_or_else(
        || TaskPriority::ALL.map(TaskPriority::as_str).to_vec(),
        |priority| vec![priority.as_str()],
    )
}

#[async_trait]
impl<C> TaskRepository for PostgresTaskRepository<C>
where
    C: Clock + Send + Sync,
{
    async fn create(&self, new_task: &NewTask) -> TaskRepositoryResult<Task> {
        let row = NewTaskRow {
            title: new_task.title().as_str().to_owned(),
            description: new_task.description().map(ToOwned::to_owned),
            priority: new_task.priority().as_str().to_owned(),
            status: TaskStatus::New.as_str().to_owned(),
            created_at: self.clock.utc(),
        };

        self.run_blocking(move |connection| {
            let stored: TaskRow = diesel::insert_into(tasks::table)
                .values(&row)
                .returning(TaskRow::as_returning())
                .get_result(connection)
                .map_err(TaskRepositoryError::persistence)?;
            row_to_task(stored)
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn update(&self, task: &Task, expected_status: TaskStatus) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let changes = TaskChangesRow {
            status: task.status().as_str().to_owned(),
            started_at: task.started_at(),
            completed_at: task.completed_at(),
            result: task.result().map(ToOwned::to_owned),
            error_info: task.error_info().map(ToOwned::to_owned),
        };

        self.run_blocking(move |connection| {
            // Compare-and-swap on the previously observed status: the losing
            // side of a racing transition matches zero rows.
            let updated = diesel::update(
                tasks::table.filter(
                    tasks::id
                        .eq(task_id.into_inner())
                        .and(tasks::status.eq(expected_status.as_str())),
                ),
            )
            .set(&changes)
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;

            if updated > 0 {
                return Ok(());
            }

            let exists: i64 = tasks::table
                .filter(tasks::id.eq(task_id.into_inner()))
                .count()
                .get_result(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if exists == 0 {
                Err(TaskRepositoryError::NotFound(task_id))
            } else {
                Err(TaskRepositoryError::StaleStatus {
                    task_id,
                    expected: expected_status,
                })
            }
        })
        .await
    }

    async fn list(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> TaskRepositoryResult<(Vec<Task>, u64)> {
        let statuses = status_values(filter);
        let priorities = priority_values(filter);
        let offset = i64::try_from(page.offset()).map_err(TaskRepositoryError::persistence)?;
        let limit = i64::from(page.size());

        self.run_blocking(move |connection| {
            let total: i64 = tasks::table
                .filter(tasks::status.eq_any(statuses.clone()))
                .filter(tasks::priority.eq_any(priorities.clone()))
                .count()
                .get_result(connection)
                .map_err(TaskRepositoryError::persistence)?;

            let rows = tasks::table
                .filter(tasks::status.eq_any(statuses))
                .filter(tasks::priority.eq_any(priorities))
                .order((tasks::created_at.desc(), tasks::id.desc()))
                .offset(offset)
                .limit(limit)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;

            let records = rows
                .into_iter()
                .map(row_to_task)
                .collect::<TaskRepositoryResult<Vec<_>>>()?;
            Ok((records, u64::try_from(total).unwrap_or(0)))
        })
        .await
    }

    async fn find_new_older_than(&self, cutoff: DateTime<Utc>) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::status.eq(TaskStatus::New.as_str()))
                .filter(tasks::created_at.le(cutoff))
                .order(tasks::created_at.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter()
                .map(row_to_task)
                .collect::<TaskRepositoryResult<Vec<_>>>()
        })
        .await
    }

    async fn ping(&self) -> TaskRepositoryResult<()> {
        self.run_blocking(|connection| {
            diesel::sql_query("SELECT 1")
                .execute(connection)
                .map(|_| ())
                .map_err(TaskRepositoryError::persistence)
        })
        .await
    }
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let TaskRow {
        id,
        title: persisted_title,
        description,
        priority: persisted_priority,
        status: persisted_status,
        created_at,
        started_at,
        completed_at,
        result,
        error_info,
    } = row;

    let title = TaskTitle::new(persisted_title).map_err(TaskRepositoryError::persistence)?;
    let priority = TaskPriority::try_from(persisted_priority.as_str())
        .map_err(TaskRepositoryError::persistence)?;
    let status = TaskStatus::try_from(persisted_status.as_str())
        .map_err(TaskRepositoryError::persistence)?;

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::new(id),
        title,
        description,
        priority,
        status,
        created_at,
        started_at,
        completed_at,
        result,
        error_info,
    }))
}
