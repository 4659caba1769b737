//! Durable task queue backed by a `PostgreSQL` outbox table.
//!
//! Publication inserts a row; receiving claims the highest-priority due row
//! under a redelivery lease; acknowledgement deletes the row and a negative
//! acknowledgement makes it due again immediately. A consumer that crashes
//! mid-processing simply lets its lease expire and the message is delivered
//! again: the at-least-once contract without a separate broker process.

use super::{
    models::{NewOutboxRow, OutboxRow},
    repository::TaskPgPool,
    schema::task_outbox,
};
use crate::task::ports::{
    Acknowledger, Delivery, TaskMessage, TaskQueue, TaskQueueError, TaskQueueResult, WirePriority,
};
use async_trait::async_trait;
use chrono::TimeDelta;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;

/// `PostgreSQL`-backed durable task queue.
#[derive(Debug, Clone)]
pub struct PostgresTaskQueue<C> {
    pool: TaskPgPool,
    clock: Arc<C>,
    poll_interval: Duration,
    lease: TimeDelta,
}

impl<C> PostgresTaskQueue<C> {
    /// Creates a queue over the given pool.
    ///
    /// `poll_interval` bounds how often an idle consumer re-checks the
    /// outbox; `lease_seconds` is how long a claimed message stays invisible
    /// before it is considered abandoned and redelivered.
    #[must_use]
    pub fn new(
        pool: TaskPgPool,
        clock: Arc<C>,
        poll_interval: Duration,
        lease_seconds: u32,
    ) -> Self {
        Self {
            pool,
            clock,
            poll_interval,
            lease: TimeDelta::seconds(i64::from(lease_seconds)),
        }
    }
}

async fn run_blocking<F, T>(pool: &TaskPgPool, f: F) -> TaskQueueResult<T>
where
    F: FnOnce(&mut PgConnection) -> Result<T, DieselError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut connection = pool.get().map_err(TaskQueueError::transport)?;
        f(&mut connection).map_err(TaskQueueError::transport)
    })
    .await
    .map_err(TaskQueueError::transport)?
}

#[async_trait]
impl<C> TaskQueue for PostgresTaskQueue<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn publish(&self, message: &TaskMessage, priority: WirePriority) -> TaskQueueResult<()> {
        let payload = serde_json::to_string(message).map_err(TaskQueueError::encode)?;
        let now = self.clock.utc();
        let row = NewOutboxRow {
            task_id: message.task_id,
            priority: i16::from(priority.value()),
            payload,
            available_at: now,
            delivery_count: 0,
            enqueued_at: now,
        };

        run_blocking(&self.pool, move |connection| {
            diesel::insert_into(task_outbox::table)
                .values(&row)
                .execute(connection)
                .map(|_| ())
        })
        .await
    }

    async fn receive(&self) -> TaskQueueResult<Delivery> {
        loop {
            let now = self.clock.utc();
            let lease = self.lease;
            let claimed = run_blocking(&self.pool, move |connection| {
                connection.transaction::<Option<OutboxRow>, DieselError, _>(|conn| {
                    let row = task_outbox::table
                        .filter(task_outbox::available_at.le(now))
                        .order((task_outbox::priority.desc(), task_outbox::id.asc()))
                        .select(OutboxRow::as_select())
                        .for_update()
                        .skip_locked()
                        .first::<OutboxRow>(conn)
                        .optional()?;
                    let Some(row) = row else {
                        return Ok(None);
                    };

                    diesel::update(task_outbox::table.filter(task_outbox::id.eq(row.id)))
                        .set((
                            task_outbox::available_at.eq(now + lease),
                            task_outbox::delivery_count.eq(row.delivery_count + 1),
                        ))
                        .execute(conn)?;
                    Ok(Some(row))
                })
            })
            .await?;

            if let Some(row) = claimed {
                let acker = PgAcker {
                    pool: self.pool.clone(),
                    clock: Arc::clone(&self.clock),
                    outbox_id: row.id,
                };
                return Ok(Delivery::new(
                    row.payload.into_bytes(),
                    row.delivery_count > 0,
                    Box::new(acker),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

struct PgAcker<C> {
    pool: TaskPgPool,
    clock: Arc<C>,
    outbox_id: i64,
}

#[async_trait]
impl<C> Acknowledger for PgAcker<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn ack(self: Box<Self>) -> TaskQueueResult<()> {
        let outbox_id = self.outbox_id;
        run_blocking(&self.pool, move |connection| {
            diesel::delete(task_outbox::table.filter(task_outbox::id.eq(outbox_id)))
                .execute(connection)
                .map(|_| ())
        })
        .await
    }

    async fn nack(self: Box<Self>) -> TaskQueueResult<()> {
        let outbox_id = self.outbox_id;
        let now = self.clock.utc();
        run_blocking(&self.pool, move |connection| {
            diesel::update(task_outbox::table.filter(task_outbox::id.eq(outbox_id)))
                .set(task_outbox::available_at.eq(now))
                .execute(connection)
                .map(|_| ())
        })
        .await
    }
}
