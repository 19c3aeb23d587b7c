//! Redis-backed distributed lease so one scheduler instance runs each tick.

use async_trait::async_trait;
use corvid_application::{SchedulerLease, SchedulerLeaseCoordinator};
use corvid_core::{AppError, AppResult};
use redis::{Cmd, Script};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

/// Redis implementation of scheduler lease coordination.
#[derive(Clone)]
pub struct RedisSchedulerLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSchedulerLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Store(format!("failed to connect to redis: {error}")))
    }
}

fn validate_lease_request(scope_key: &str, holder_id: &str, lease_seconds: u32) -> AppResult<()> {
    if scope_key.trim().is_empty() {
        return Err(AppError::Validation(
            "scheduler lease scope_key must not be empty".to_owned(),
        ));
    }

    if holder_id.trim().is_empty() {
        return Err(AppError::Validation(
            "scheduler lease holder_id must not be empty".to_owned(),
        ));
    }

    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "scheduler lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

/// `SET key token NX EX ttl`, so the lease key never exists without an expiry.
fn acquire_command(key: &str, token: &str, lease_seconds: u32) -> Cmd {
    let mut command = redis::cmd("SET");
    command
        .arg(key)
        .arg(token)
        .arg("NX")
        .arg("EX")
        .arg(lease_seconds);
    command
}

#[async_trait]
impl SchedulerLeaseCoordinator for RedisSchedulerLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SchedulerLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let mut connection = self.connection().await?;

        let acquired: Option<String> = acquire_command(key.as_str(), token.as_str(), lease_seconds)
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Store(format!("failed to acquire scheduler lease: {error}"))
            })?;

        if acquired.is_none() {
            return Ok(None);
        }

        Ok(Some(SchedulerLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &SchedulerLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let mut connection = self.connection().await?;

        Script::new(RELEASE_LEASE_SCRIPT)
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Store(format!("failed to release scheduler lease: {error}"))
            })?;

        Ok(())
    }
}
