use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use corvid_core::{AppResult, OrgId};
use corvid_domain::{ActionExecution, AutomationRule};
use uuid::Uuid;

use super::inputs::{
    AutomationRuleListQuery, CreateAutomationRuleInput, ExecutionListQuery, ExecutionOutcome,
    UpdateAutomationRuleInput,
};

/// Repository port for automation rules.
#[async_trait]
pub trait AutomationRuleRepository: Send + Sync {
    /// Lists active, non-deleted rules across all organizations whose last run
    /// is at least `throttle_window` before `now`, oldest last run first.
    async fn fetch_due_rules(
        &self,
        now: DateTime<Utc>,
        throttle_window: Duration,
    ) -> AppResult<Vec<AutomationRule>>;

    /// Moves the last-run marker of one rule.
    async fn mark_rule_run(&self, rule_id: Uuid, ran_at: DateTime<Utc>) -> AppResult<()>;

    /// Creates one rule.
    async fn create_rule(&self, input: CreateAutomationRuleInput) -> AppResult<AutomationRule>;

    /// Returns one non-deleted rule of an organization.
    async fn find_rule(&self, org_id: OrgId, rule_id: Uuid) -> AppResult<Option<AutomationRule>>;

    /// Lists non-deleted rules of an organization, newest first.
    async fn list_rules(
        &self,
        org_id: OrgId,
        query: &AutomationRuleListQuery,
    ) -> AppResult<Vec<AutomationRule>>;

    /// Counts non-deleted rules of an organization matching the search.
    async fn count_rules(&self, org_id: OrgId, search: Option<&str>) -> AppResult<u64>;

    /// Updates one non-deleted rule. Returns `None` when it does not exist.
    async fn update_rule(
        &self,
        org_id: OrgId,
        input: UpdateAutomationRuleInput,
    ) -> AppResult<Option<AutomationRule>>;

    /// Soft-deletes one rule. Returns whether a live rule was deleted.
    async fn soft_delete_rule(
        &self,
        org_id: OrgId,
        rule_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Repository port for rule execution history.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Creates one execution in running state.
    async fn create_running_execution(&self, rule_id: Uuid) -> AppResult<ActionExecution>;

    /// Moves one running execution to its terminal state.
    ///
    /// Fails with `AppError::Conflict` when the execution is already terminal
    /// and `AppError::NotFound` when it does not exist.
    async fn complete_execution(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> AppResult<ActionExecution>;

    /// Deletes executions started before the cutoff. Returns deleted row count.
    async fn delete_executions_started_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Lists executions of one rule, newest first.
    async fn list_executions(
        &self,
        rule_id: Uuid,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>>;

    /// Counts executions of one rule.
    async fn count_executions(&self, rule_id: Uuid) -> AppResult<u64>;

    /// Returns the newest execution of one rule.
    async fn latest_execution(&self, rule_id: Uuid) -> AppResult<Option<ActionExecution>>;
}
