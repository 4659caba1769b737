//! Queue worker process for the Conveyor task service.
//!
//! The worker connects to `PostgreSQL`, drains the durable task queue with
//! bounded concurrency, and periodically runs the stalled-publication sweep
//! that re-drives tasks whose creation-time publish failed. Configuration
//! comes from the environment (see [`conveyor::config::Settings`]); a local
//! `.env` file is honoured when present.

use chrono::TimeDelta;
use conveyor::config::{Settings, SettingsError};
use conveyor::task::{
    adapters::{
        executor::SimulatedTaskExecutor,
        postgres::{PostgresTaskQueue, PostgresTaskRepository, TaskPgPool},
    },
    ports::{TaskQueue, TaskRepository},
    services::{TaskCoordinator, WorkerLoop, WorkerLoopError},
};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Errors that abort worker process startup or shutdown.
#[derive(Debug, Error)]
enum WorkerProcessError {
    #[error("failed to read settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("failed to build database pool: {0}")]
    Pool(#[source] diesel::r2d2::PoolError),
    #[error("worker loop failed: {0}")]
    Worker(#[from] WorkerLoopError),
}

#[tokio::main]
async fn main() -> Result<(), WorkerProcessError> {
    // A missing .env file is fine; the process environment takes precedence.
    drop(dotenvy::dotenv());
    let settings = Settings::from_env()?;
    init_tracing(&settings);

    let pool = build_pool(&settings)?;
    let clock = Arc::new(DefaultClock);
    let repository = Arc::new(PostgresTaskRepository::new(pool.clone(), Arc::clone(&clock)));
    let queue = Arc::new(PostgresTaskQueue::new(
        pool,
        Arc::clone(&clock),
        settings.queue_poll_interval,
        settings.queue_lease_seconds,
    ));
    let coordinator = Arc::new(TaskCoordinator::new(
        repository,
        Arc::clone(&queue),
        Arc::clone(&clock),
    ));
    let executor = Arc::new(SimulatedTaskExecutor::new(clock));
    let worker = Arc::new(WorkerLoop::new(
        Arc::clone(&coordinator),
        queue,
        executor,
        settings.worker_concurrency,
        settings.task_timeout,
    ));

    spawn_republish_sweep(&coordinator, settings.stalled_republish_seconds);

    tokio::select! {
        result = WorkerLoop::run(worker) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }
    Ok(())
}

fn init_tracing(settings: &Settings) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn build_pool(settings: &Settings) -> Result<TaskPgPool, WorkerProcessError> {
    let manager = ConnectionManager::<PgConnection>::new(&settings.database_url);
    Pool::builder()
        .build(manager)
        .map_err(WorkerProcessError::Pool)
}

/// Periodically re-drives tasks whose creation-time publish was lost.
fn spawn_republish_sweep<R, Q, C>(
    coordinator: &Arc<TaskCoordinator<R, Q, C>>,
    stalled_after_seconds: u32,
) where
    R: TaskRepository + 'static,
    Q: TaskQueue + 'static,
    C: Clock + Send + Sync + 'static,
{
    let coordinator = Arc::clone(coordinator);
    let older_than = TimeDelta::seconds(i64::from(stalled_after_seconds));
    let period = Duration::from_secs(u64::from(stalled_after_seconds));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(err) = coordinator.republish_stalled(older_than).await {
                warn!(error = %err, "stalled-task republish sweep failed");
            }
        }
    });
}
