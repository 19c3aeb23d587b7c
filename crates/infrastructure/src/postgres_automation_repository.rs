use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corvid_application::{
    AutomationRuleListQuery, AutomationRuleRepository, CreateAutomationRuleInput,
    ExecutionListQuery, ExecutionOutcome, ExecutionRepository, UpdateAutomationRuleInput,
};
use corvid_core::{AppError, AppResult, OrgId};
use corvid_domain::{
    ActionExecution, AutomationRule, AutomationRuleInput, ExecutionStatus,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

mod executions;
mod rules;

const RULE_COLUMNS: &str = "id, org_id, name, description, filter_config, action_config, is_active, last_run_at, created_by, created_at, updated_at, deleted_at";

const EXECUTION_COLUMNS: &str =
    "id, rule_id, started_at, completed_at, status, objects_affected, error_message, execution_log";

/// PostgreSQL-backed repository for automation rules and their executions.
#[derive(Clone)]
pub struct PostgresAutomationRepository {
    pool: PgPool,
}

impl PostgresAutomationRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AutomationRuleRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    description: String,
    filter_config: Value,
    action_config: Value,
    is_active: bool,
    last_run_at: Option<DateTime<Utc>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AutomationRuleRow> for AutomationRule {
    type Error = AppError;

    fn try_from(row: AutomationRuleRow) -> AppResult<Self> {
        AutomationRule::new(AutomationRuleInput {
            id: row.id,
            org_id: OrgId::from_uuid(row.org_id),
            name: row.name,
            description: row.description,
            filter_config: row.filter_config,
            action_config: row.action_config,
            is_active: row.is_active,
            last_run_at: row.last_run_at,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ActionExecutionRow {
    id: Uuid,
    rule_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
    objects_affected: i32,
    error_message: Option<String>,
    execution_log: Option<Value>,
}

impl TryFrom<ActionExecutionRow> for ActionExecution {
    type Error = AppError;

    fn try_from(row: ActionExecutionRow) -> AppResult<Self> {
        Ok(ActionExecution {
            id: row.id,
            rule_id: row.rule_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            status: ExecutionStatus::parse(row.status.as_str())?,
            objects_affected: u32::try_from(row.objects_affected).map_err(|error| {
                AppError::Store(format!(
                    "execution '{}' has invalid objects_affected: {error}",
                    row.id
                ))
            })?,
            error_message: row.error_message,
            execution_log: row.execution_log,
        })
    }
}

fn to_i64(value: usize, label: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid {label}: {error}")))
}

fn to_u64(value: i64, label: &str) -> AppResult<u64> {
    u64::try_from(value).map_err(|error| AppError::Store(format!("invalid {label}: {error}")))
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search.map(crate::like_pattern)
}

#[async_trait]
impl AutomationRuleRepository for PostgresAutomationRepository {
    async fn fetch_due_rules(
        &self,
        now: DateTime<Utc>,
        throttle_window: chrono::Duration,
    ) -> AppResult<Vec<AutomationRule>> {
        self.fetch_due_rules_impl(now, throttle_window).await
    }

    async fn mark_rule_run(&self, rule_id: Uuid, ran_at: DateTime<Utc>) -> AppResult<()> {
        self.mark_rule_run_impl(rule_id, ran_at).await
    }

    async fn create_rule(&self, input: CreateAutomationRuleInput) -> AppResult<AutomationRule> {
        self.create_rule_impl(input).await
    }

    async fn find_rule(&self, org_id: OrgId, rule_id: Uuid) -> AppResult<Option<AutomationRule>> {
        self.find_rule_impl(org_id, rule_id).await
    }

    async fn list_rules(
        &self,
        org_id: OrgId,
        query: &AutomationRuleListQuery,
    ) -> AppResult<Vec<AutomationRule>> {
        self.list_rules_impl(org_id, query).await
    }

    async fn count_rules(&self, org_id: OrgId, search: Option<&str>) -> AppResult<u64> {
        self.count_rules_impl(org_id, search).await
    }

    async fn update_rule(
        &self,
        org_id: OrgId,
        input: UpdateAutomationRuleInput,
    ) -> AppResult<Option<AutomationRule>> {
        self.update_rule_impl(org_id, input).await
    }

    async fn soft_delete_rule(
        &self,
        org_id: OrgId,
        rule_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.soft_delete_rule_impl(org_id, rule_id, deleted_at).await
    }
}

#[async_trait]
impl ExecutionRepository for PostgresAutomationRepository {
    async fn create_running_execution(&self, rule_id: Uuid) -> AppResult<ActionExecution> {
        self.create_running_execution_impl(rule_id).await
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> AppResult<ActionExecution> {
        self.complete_execution_impl(execution_id, outcome).await
    }

    async fn delete_executions_started_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        self.delete_executions_started_before_impl(cutoff).await
    }

    async fn list_executions(
        &self,
        rule_id: Uuid,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        self.list_executions_impl(rule_id, query).await
    }

    async fn count_executions(&self, rule_id: Uuid) -> AppResult<u64> {
        self.count_executions_impl(rule_id).await
    }

    async fn latest_execution(&self, rule_id: Uuid) -> AppResult<Option<ActionExecution>> {
        self.latest_execution_impl(rule_id).await
    }
}
