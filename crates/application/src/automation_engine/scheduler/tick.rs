use std::sync::Arc;

use corvid_core::AppResult;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::automation_engine::{RuleRunOutcome, RunBudget};
use crate::automation_ports::SchedulerLease;

use super::{AutomationScheduler, SCHEDULER_LEASE_SCOPE};

/// Counters describing one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Rules returned as due.
    pub due_rules: usize,
    /// Rule-runs started.
    pub dispatched: usize,
    /// Rule-runs that completed.
    pub completed: usize,
    /// Rule-runs that failed, including timeouts.
    pub failed: usize,
    /// Rules skipped because their configuration could not be decoded.
    pub skipped: usize,
    /// Failed rule-runs caused by a deadline.
    pub timed_out: usize,
    /// Executions deleted by the retention prune.
    pub pruned_executions: u64,
    /// Tick skipped because another instance holds the scheduler lease.
    pub skipped_by_lease: bool,
}

type JoinedRun = Result<(Uuid, AppResult<RuleRunOutcome>), JoinError>;

impl TickReport {
    fn record(&mut self, joined: JoinedRun) {
        match joined {
            Ok((_, Ok(RuleRunOutcome::Completed(_)))) => self.completed += 1,
            Ok((_, Ok(RuleRunOutcome::Skipped { .. }))) => self.skipped += 1,
            Ok((_, Ok(RuleRunOutcome::Failed { error, .. }))) => {
                self.failed += 1;
                if error.is_timeout() {
                    self.timed_out += 1;
                }
            }
            Ok((rule_id, Err(error))) => {
                warn!(%rule_id, error = %error, "automation rule-run errored");
                self.failed += 1;
                if error.is_timeout() {
                    self.timed_out += 1;
                }
            }
            Err(join_error) => {
                error!(error = %join_error, "automation rule-run task aborted");
                self.failed += 1;
            }
        }
    }
}

enum LeaseGate {
    Open(Option<SchedulerLease>),
    HeldElsewhere,
}

impl AutomationScheduler {
    /// Runs one tick immediately and waits for every dispatched rule-run.
    pub async fn run_tick(&self) -> TickReport {
        self.tick(&CancellationToken::new()).await
    }

    pub(super) async fn tick(&self, shutdown: &CancellationToken) -> TickReport {
        let batch_deadline = Instant::now() + self.config.batch_timeout;
        let mut report = TickReport::default();

        let lease = match self.acquire_tick_lease().await {
            Ok(LeaseGate::Open(lease)) => lease,
            Ok(LeaseGate::HeldElsewhere) => {
                debug!("automation scheduler lease held by another instance, skipping tick");
                report.skipped_by_lease = true;
                return report;
            }
            Err(lease_error) => {
                error!(error = %lease_error, "failed to acquire automation scheduler lease");
                return report;
            }
        };

        report.pruned_executions = self.prune_if_due(batch_deadline).await;
        self.dispatch_due_rules(shutdown, batch_deadline, &mut report)
            .await;

        if let Some(lease) = lease {
            self.release_tick_lease(&lease).await;
        }

        report
    }

    async fn dispatch_due_rules(
        &self,
        shutdown: &CancellationToken,
        batch_deadline: Instant,
        report: &mut TickReport,
    ) {
        let throttle_window = match self.config.throttle_window_chrono() {
            Ok(window) => window,
            Err(config_error) => {
                error!(error = %config_error, "invalid automation throttle window");
                return;
            }
        };

        let rules = match self
            .rule_repository
            .fetch_due_rules(self.clock.now(), throttle_window)
            .await
        {
            Ok(rules) => rules,
            Err(fetch_error) => {
                error!(error = %fetch_error, "failed to fetch due automation rules");
                return;
            }
        };
        report.due_rules = rules.len();
        if rules.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_rules));
        let mut runs = JoinSet::new();

        for rule in rules {
            if shutdown.is_cancelled() {
                info!("shutdown requested, no further automation rules dispatched");
                break;
            }

            if Instant::now() >= batch_deadline {
                warn!(
                    remaining = report.due_rules - report.dispatched,
                    "automation batch deadline reached before every due rule was dispatched"
                );
                break;
            }

            let permit = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("shutdown requested while waiting for an automation slot");
                    break;
                }
                () = tokio::time::sleep_until(batch_deadline) => {
                    warn!(
                        remaining = report.due_rules - report.dispatched,
                        "automation batch deadline reached while waiting for a slot"
                    );
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(closed) => {
                        error!(error = %closed, "automation semaphore closed");
                        break;
                    }
                },
            };

            let deadline = (Instant::now() + self.config.rule_timeout).min(batch_deadline);
            let executor = self.executor.clone();
            report.dispatched += 1;
            debug!(rule_id = %rule.id(), org_id = %rule.org_id(), "dispatching automation rule");

            runs.spawn(async move {
                let _permit = permit;
                let result = executor.run(&rule, RunBudget::until(deadline)).await;
                (rule.id(), result)
            });

            while let Some(joined) = runs.try_join_next() {
                report.record(joined);
            }
        }

        while let Some(joined) = runs.join_next().await {
            report.record(joined);
        }
    }

    async fn acquire_tick_lease(&self) -> AppResult<LeaseGate> {
        let Some(tick_lease) = &self.tick_lease else {
            return Ok(LeaseGate::Open(None));
        };

        let lease = tick_lease
            .coordinator
            .try_acquire_lease(
                SCHEDULER_LEASE_SCOPE,
                tick_lease.holder_id.as_str(),
                self.config.lease_seconds(),
            )
            .await?;

        Ok(match lease {
            Some(lease) => LeaseGate::Open(Some(lease)),
            None => LeaseGate::HeldElsewhere,
        })
    }

    async fn release_tick_lease(&self, lease: &SchedulerLease) {
        let Some(tick_lease) = &self.tick_lease else {
            return;
        };

        if let Err(release_error) = tick_lease.coordinator.release_lease(lease).await {
            warn!(error = %release_error, "failed to release automation scheduler lease");
        }
    }

    /// Prunes old executions at most once per local day during the prune hour.
    async fn prune_if_due(&self, batch_deadline: Instant) -> u64 {
        if self.clock.local_hour() != self.config.prune_hour {
            return 0;
        }

        let today = self.clock.local_date();
        {
            let mut last_prune_date = self.last_prune_date.lock().await;
            if *last_prune_date == Some(today) {
                return 0;
            }
            *last_prune_date = Some(today);
        }

        let cutoff =
            self.clock.now() - chrono::Duration::days(i64::from(self.config.execution_retention_days));
        match RunBudget::until(batch_deadline)
            .bound("execution prune", self.recorder.prune(cutoff))
            .await
        {
            Ok(deleted) => deleted,
            Err(prune_error) => {
                error!(error = %prune_error, "failed to prune automation executions");
                *self.last_prune_date.lock().await = None;
                0
            }
        }
    }
}
