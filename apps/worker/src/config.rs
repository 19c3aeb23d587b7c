use std::env;
use std::time::Duration;

use corvid_application::AutomationSchedulerConfig;
use corvid_core::{AppError, AppResult};

/// Runtime settings for the automation worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub instance_id: String,
    pub run_migrations: bool,
    pub scheduler: AutomationSchedulerConfig,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let database_url = required(&lookup, "DATABASE_URL")?;
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5_u32)?;
        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        let redis_url = optional(&lookup, "REDIS_URL");
        let instance_id = optional(&lookup, "AUTOMATION_INSTANCE_ID")
            .unwrap_or_else(|| format!("automation-{}", std::process::id()));
        let run_migrations = optional(&lookup, "AUTOMATION_RUN_MIGRATIONS")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));

        let defaults = AutomationSchedulerConfig::default();
        let scheduler = AutomationSchedulerConfig {
            interval: seconds_or(&lookup, "AUTOMATION_INTERVAL_SECONDS", defaults.interval)?,
            throttle_window: seconds_or(
                &lookup,
                "AUTOMATION_THROTTLE_SECONDS",
                defaults.throttle_window,
            )?,
            max_concurrent_rules: parse_or(
                &lookup,
                "AUTOMATION_MAX_CONCURRENT_RULES",
                defaults.max_concurrent_rules,
            )?,
            batch_timeout: seconds_or(
                &lookup,
                "AUTOMATION_BATCH_TIMEOUT_SECONDS",
                defaults.batch_timeout,
            )?,
            rule_timeout: seconds_or(
                &lookup,
                "AUTOMATION_RULE_TIMEOUT_SECONDS",
                defaults.rule_timeout,
            )?,
            execution_retention_days: parse_or(
                &lookup,
                "AUTOMATION_EXECUTION_RETENTION_DAYS",
                defaults.execution_retention_days,
            )?,
            prune_hour: parse_or(&lookup, "AUTOMATION_PRUNE_HOUR", defaults.prune_hour)?,
        };
        scheduler.validate()?;

        Ok(Self {
            database_url,
            database_max_connections,
            redis_url,
            instance_id,
            run_migrations,
            scheduler,
        })
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> AppResult<String> {
    optional(lookup, name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

fn seconds_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> AppResult<Duration> {
    parse_or(lookup, name, default.as_secs()).map(Duration::from_secs)
}
