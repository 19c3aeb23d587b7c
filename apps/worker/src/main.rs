//! Corvid automation worker runtime.

#![forbid(unsafe_code)]

mod config;

use std::env;
use std::sync::Arc;

use corvid_application::{
    ActionApplier, AutomationScheduler, ExecutionRecorder, FilterEvaluator, RuleExecutor,
    SystemClock,
};
use corvid_core::{AppError, AppResult};
use corvid_infrastructure::{
    PostgresAutomationRepository, PostgresObjectStore, RedisSchedulerLeaseCoordinator,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

const LEASE_KEY_PREFIX: &str = "corvid:lease";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
    let config = WorkerConfig::load()?;
    let pool = connect_pool(&config).await?;

    if migrate_only || config.run_migrations {
        sqlx::migrate!("../../crates/infrastructure/migrations")
            .run(&pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
        info!("database migrations applied successfully");
    }

    if migrate_only {
        return Ok(());
    }

    let scheduler = Arc::new(build_scheduler(&config, pool)?);
    scheduler.start().await?;

    let settings = scheduler.config();
    info!(
        instance_id = %config.instance_id,
        interval_seconds = settings.interval.as_secs(),
        throttle_seconds = settings.throttle_window.as_secs(),
        max_concurrent_rules = settings.max_concurrent_rules,
        lease_enabled = config.redis_url.is_some(),
        "corvid-worker started"
    );

    shutdown_signal().await?;
    scheduler.stop().await?;
    info!(instance_id = %config.instance_id, "corvid-worker stopped");

    Ok(())
}

async fn connect_pool(config: &WorkerConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_scheduler(config: &WorkerConfig, pool: PgPool) -> AppResult<AutomationScheduler> {
    let repository = Arc::new(PostgresAutomationRepository::new(pool.clone()));
    let object_store = Arc::new(PostgresObjectStore::new(pool));
    let clock = Arc::new(SystemClock);

    let recorder = ExecutionRecorder::new(repository.clone());
    let executor = RuleExecutor::new(
        repository.clone(),
        FilterEvaluator::new(object_store.clone()),
        ActionApplier::new(object_store),
        recorder.clone(),
        clock.clone(),
    );
    let scheduler = AutomationScheduler::new(
        config.scheduler.clone(),
        repository,
        executor,
        recorder,
        clock,
    );

    let Some(redis_url) = config.redis_url.as_deref() else {
        return Ok(scheduler);
    };

    let client = redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
    let coordinator = Arc::new(RedisSchedulerLeaseCoordinator::new(client, LEASE_KEY_PREFIX));
    Ok(scheduler.with_lease_coordinator(coordinator, config.instance_id.clone()))
}

async fn shutdown_signal() -> AppResult<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.map_err(|error| {
            AppError::Internal(format!("failed to install Ctrl-C handler: {error}"))
        })
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).map_err(
                |error| AppError::Internal(format!("failed to install SIGTERM handler: {error}")),
            )?;
        signal.recv().await;
        Ok::<(), AppError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<AppResult<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            info!("received SIGINT, stopping scheduler");
        }
        result = terminate => {
            result?;
            info!("received SIGTERM, stopping scheduler");
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
