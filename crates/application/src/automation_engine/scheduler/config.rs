use std::time::Duration;

use corvid_core::{AppError, AppResult};

/// Runtime settings of the automation scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationSchedulerConfig {
    /// Delay between ticks.
    pub interval: Duration,
    /// Minimum time between two runs of the same rule.
    pub throttle_window: Duration,
    /// Upper bound of concurrent rule-runs per tick.
    pub max_concurrent_rules: usize,
    /// Budget of one tick, measured from its start.
    pub batch_timeout: Duration,
    /// Budget of one rule-run, measured from its dispatch.
    pub rule_timeout: Duration,
    /// Executions older than this many days are pruned.
    pub execution_retention_days: u32,
    /// Local hour (0..=23) during which pruning runs.
    pub prune_hour: u32,
}

impl Default for AutomationSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            throttle_window: Duration::from_secs(10 * 60),
            max_concurrent_rules: 5,
            batch_timeout: Duration::from_secs(5 * 60),
            rule_timeout: Duration::from_secs(2 * 60),
            execution_retention_days: 14,
            prune_hour: 7,
        }
    }
}

impl AutomationSchedulerConfig {
    /// Checks that every setting is usable.
    pub fn validate(&self) -> AppResult<()> {
        require_positive_duration("interval", self.interval)?;
        require_positive_duration("throttle_window", self.throttle_window)?;
        require_positive_duration("batch_timeout", self.batch_timeout)?;
        require_positive_duration("rule_timeout", self.rule_timeout)?;

        if self.max_concurrent_rules == 0 {
            return Err(AppError::Validation(
                "max_concurrent_rules must be greater than zero".to_owned(),
            ));
        }

        if self.execution_retention_days == 0 {
            return Err(AppError::Validation(
                "execution_retention_days must be greater than zero".to_owned(),
            ));
        }

        if self.prune_hour > 23 {
            return Err(AppError::Validation(format!(
                "prune_hour must be between 0 and 23, got {}",
                self.prune_hour
            )));
        }

        Ok(())
    }

    pub(super) fn throttle_window_chrono(&self) -> AppResult<chrono::Duration> {
        chrono::Duration::from_std(self.throttle_window).map_err(|error| {
            AppError::Validation(format!("throttle_window is out of range: {error}"))
        })
    }

    pub(super) fn lease_seconds(&self) -> u32 {
        u32::try_from(self.batch_timeout.as_secs().max(1)).unwrap_or(u32::MAX)
    }
}

fn require_positive_duration(name: &str, value: Duration) -> AppResult<()> {
    if value.is_zero() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(())
}
