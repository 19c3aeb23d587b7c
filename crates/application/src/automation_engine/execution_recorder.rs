use std::sync::Arc;

use chrono::{DateTime, Utc};
use corvid_core::AppResult;
use corvid_domain::ActionExecution;
use tracing::{debug, info};
use uuid::Uuid;

use crate::automation_ports::{ExecutionOutcome, ExecutionRepository};

/// Writes the execution history of rule-runs.
#[derive(Clone)]
pub struct ExecutionRecorder {
    repository: Arc<dyn ExecutionRepository>,
}

impl ExecutionRecorder {
    /// Creates a recorder over an execution repository.
    #[must_use]
    pub fn new(repository: Arc<dyn ExecutionRepository>) -> Self {
        Self { repository }
    }

    /// Persists a new running execution for one rule.
    pub async fn begin(&self, rule_id: Uuid) -> AppResult<ActionExecution> {
        let execution = self.repository.create_running_execution(rule_id).await?;
        debug!(%rule_id, execution_id = %execution.id, "execution started");
        Ok(execution)
    }

    /// Moves a running execution to its terminal state.
    pub async fn complete(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> AppResult<ActionExecution> {
        let execution = self
            .repository
            .complete_execution(execution_id, outcome)
            .await?;
        debug!(
            %execution_id,
            status = execution.status.as_str(),
            objects_affected = execution.objects_affected,
            "execution finished"
        );
        Ok(execution)
    }

    /// Deletes executions that started before `older_than`.
    pub async fn prune(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let deleted = self
            .repository
            .delete_executions_started_before(older_than)
            .await?;
        info!(deleted, cutoff = %older_than, "pruned automation executions");
        Ok(deleted)
    }
}
