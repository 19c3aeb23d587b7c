use std::sync::Arc;

use chrono::NaiveDate;
use corvid_core::{AppError, AppResult};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::automation_ports::{AutomationRuleRepository, Clock, SchedulerLeaseCoordinator};

use super::{ExecutionRecorder, RuleExecutor};

mod config;
mod tick;

pub use config::AutomationSchedulerConfig;
pub use tick::TickReport;

/// Lease scope guarding one scheduler tick across instances.
pub const SCHEDULER_LEASE_SCOPE: &str = "automation-scheduler";

/// Lifecycle state of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No loop task is running.
    Stopped,
    /// Loop task is running ticks.
    Running,
    /// Shutdown was requested and the loop task is draining.
    Stopping,
}

impl SchedulerState {
    /// Returns stable label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

struct RunningLoop {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

struct TickLease {
    coordinator: Arc<dyn SchedulerLeaseCoordinator>,
    holder_id: String,
}

/// Periodic driver that runs due automation rules.
pub struct AutomationScheduler {
    config: AutomationSchedulerConfig,
    rule_repository: Arc<dyn AutomationRuleRepository>,
    executor: RuleExecutor,
    recorder: ExecutionRecorder,
    clock: Arc<dyn Clock>,
    tick_lease: Option<TickLease>,
    last_prune_date: Mutex<Option<NaiveDate>>,
    running: Mutex<Option<RunningLoop>>,
    state: watch::Sender<SchedulerState>,
}

impl AutomationScheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(
        config: AutomationSchedulerConfig,
        rule_repository: Arc<dyn AutomationRuleRepository>,
        executor: RuleExecutor,
        recorder: ExecutionRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Stopped);
        Self {
            config,
            rule_repository,
            executor,
            recorder,
            clock,
            tick_lease: None,
            last_prune_date: Mutex::new(None),
            running: Mutex::new(None),
            state,
        }
    }

    /// Adds a distributed lease so only one instance runs each tick.
    #[must_use]
    pub fn with_lease_coordinator(
        mut self,
        coordinator: Arc<dyn SchedulerLeaseCoordinator>,
        holder_id: impl Into<String>,
    ) -> Self {
        self.tick_lease = Some(TickLease {
            coordinator,
            holder_id: holder_id.into(),
        });
        self
    }

    /// Returns the scheduler configuration.
    #[must_use]
    pub fn config(&self) -> &AutomationSchedulerConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Spawns the scheduler loop. The first tick runs immediately.
    pub async fn start(self: &Arc<Self>) -> AppResult<()> {
        self.config.validate()?;

        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(AppError::Conflict(
                "automation scheduler is already running".to_owned(),
            ));
        }

        let shutdown = CancellationToken::new();
        let scheduler = Arc::clone(self);
        let loop_shutdown = shutdown.clone();
        self.state.send_replace(SchedulerState::Running);
        let handle = tokio::spawn(async move { scheduler.run_loop(loop_shutdown).await });
        *running = Some(RunningLoop { shutdown, handle });

        info!(
            interval_seconds = self.config.interval.as_secs(),
            max_concurrent_rules = self.config.max_concurrent_rules,
            lease = self.tick_lease.is_some(),
            "automation scheduler started"
        );
        Ok(())
    }

    /// Requests shutdown and waits for the loop task to exit.
    ///
    /// In-flight rule-runs finish or reach their own deadline; no new rule-run
    /// starts. Stopping a stopped scheduler is a no-op.
    pub async fn stop(&self) -> AppResult<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        self.state.send_replace(SchedulerState::Stopping);
        info!("automation scheduler stopping");
        running.shutdown.cancel();
        let joined = running.handle.await;
        self.state.send_replace(SchedulerState::Stopped);

        match joined {
            Ok(()) => {
                info!("automation scheduler stopped");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "automation scheduler loop ended abnormally");
                Err(AppError::Internal(format!(
                    "automation scheduler loop task failed: {error}"
                )))
            }
        }
    }

    async fn run_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let report = self.tick(&shutdown).await;
                    info!(
                        due_rules = report.due_rules,
                        dispatched = report.dispatched,
                        completed = report.completed,
                        failed = report.failed,
                        skipped = report.skipped,
                        timed_out = report.timed_out,
                        skipped_by_lease = report.skipped_by_lease,
                        "automation tick finished"
                    );
                }
            }
        }
    }
}
