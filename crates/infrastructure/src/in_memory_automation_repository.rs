use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corvid_application::{
    AutomationRuleListQuery, AutomationRuleRepository, CreateAutomationRuleInput,
    ExecutionListQuery, ExecutionOutcome, ExecutionRepository, UpdateAutomationRuleInput,
};
use corvid_core::{AppError, AppResult, OrgId};
use corvid_domain::{ActionExecution, AutomationRule, AutomationRuleInput, ExecutionStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory automation rule and execution repository.
#[derive(Debug, Default)]
pub struct InMemoryAutomationRepository {
    rules: RwLock<HashMap<Uuid, AutomationRule>>,
    executions: RwLock<HashMap<Uuid, ActionExecution>>,
}

impl InMemoryAutomationRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a rule by id, including soft-deleted rules.
    pub async fn rule(&self, rule_id: Uuid) -> Option<AutomationRule> {
        self.rules.read().await.get(&rule_id).cloned()
    }
}

fn matches_search(rule: &AutomationRule, search: Option<&str>) -> bool {
    let Some(search) = search else {
        return true;
    };

    let needle = search.to_lowercase();
    rule.name().as_str().to_lowercase().contains(needle.as_str())
        || rule.description().to_lowercase().contains(needle.as_str())
}

fn live_rules_of(
    rules: &HashMap<Uuid, AutomationRule>,
    org_id: OrgId,
    search: Option<&str>,
) -> Vec<AutomationRule> {
    let mut values: Vec<AutomationRule> = rules
        .values()
        .filter(|rule| rule.org_id() == org_id && !rule.is_deleted())
        .filter(|rule| matches_search(rule, search))
        .cloned()
        .collect();
    values.sort_by(|left, right| {
        right
            .created_at()
            .cmp(&left.created_at())
            .then_with(|| left.id().cmp(&right.id()))
    });
    values
}

fn executions_of(
    executions: &HashMap<Uuid, ActionExecution>,
    rule_id: Uuid,
) -> Vec<ActionExecution> {
    let mut values: Vec<ActionExecution> = executions
        .values()
        .filter(|execution| execution.rule_id == rule_id)
        .cloned()
        .collect();
    values.sort_by(|left, right| {
        right
            .started_at
            .cmp(&left.started_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    values
}

#[async_trait]
impl AutomationRuleRepository for InMemoryAutomationRepository {
    async fn fetch_due_rules(
        &self,
        now: DateTime<Utc>,
        throttle_window: chrono::Duration,
    ) -> AppResult<Vec<AutomationRule>> {
        let rules = self.rules.read().await;
        let mut due: Vec<AutomationRule> = rules
            .values()
            .filter(|rule| rule.is_due(now, throttle_window))
            .cloned()
            .collect();
        due.sort_by(|left, right| {
            left.last_run_at()
                .cmp(&right.last_run_at())
                .then_with(|| left.created_at().cmp(&right.created_at()))
        });
        Ok(due)
    }

    async fn mark_rule_run(&self, rule_id: Uuid, ran_at: DateTime<Utc>) -> AppResult<()> {
        let mut rules = self.rules.write().await;
        if let Some(rule) = rules.remove(&rule_id) {
            rules.insert(rule_id, rule.with_last_run_at(ran_at));
        }
        Ok(())
    }

    async fn create_rule(&self, input: CreateAutomationRuleInput) -> AppResult<AutomationRule> {
        let now = Utc::now();
        let rule = AutomationRule::new(AutomationRuleInput {
            id: Uuid::new_v4(),
            org_id: input.org_id,
            name: input.name,
            description: input.description,
            filter_config: input.filter_config,
            action_config: input.action_config,
            is_active: input.is_active,
            last_run_at: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })?;

        self.rules.write().await.insert(rule.id(), rule.clone());
        Ok(rule)
    }

    async fn find_rule(&self, org_id: OrgId, rule_id: Uuid) -> AppResult<Option<AutomationRule>> {
        Ok(self
            .rules
            .read()
            .await
            .get(&rule_id)
            .filter(|rule| rule.org_id() == org_id && !rule.is_deleted())
            .cloned())
    }

    async fn list_rules(
        &self,
        org_id: OrgId,
        query: &AutomationRuleListQuery,
    ) -> AppResult<Vec<AutomationRule>> {
        let rules = self.rules.read().await;
        Ok(live_rules_of(&rules, org_id, query.search.as_deref())
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn count_rules(&self, org_id: OrgId, search: Option<&str>) -> AppResult<u64> {
        let rules = self.rules.read().await;
        Ok(live_rules_of(&rules, org_id, search).len() as u64)
    }

    async fn update_rule(
        &self,
        org_id: OrgId,
        input: UpdateAutomationRuleInput,
    ) -> AppResult<Option<AutomationRule>> {
        let mut rules = self.rules.write().await;
        let Some(current) = rules
            .get(&input.rule_id)
            .filter(|rule| rule.org_id() == org_id && !rule.is_deleted())
            .cloned()
        else {
            return Ok(None);
        };

        let mut edited = current.into_input();
        edited.name = input.name;
        edited.description = input.description;
        edited.filter_config = input.filter_config;
        edited.action_config = input.action_config;
        edited.is_active = input.is_active;
        edited.updated_at = Utc::now();
        let updated = AutomationRule::new(edited)?;

        rules.insert(updated.id(), updated.clone());
        Ok(Some(updated))
    }

    async fn soft_delete_rule(
        &self,
        org_id: OrgId,
        rule_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rules = self.rules.write().await;
        let Some(current) = rules
            .get(&rule_id)
            .filter(|rule| rule.org_id() == org_id && !rule.is_deleted())
            .cloned()
        else {
            return Ok(false);
        };

        let mut edited = current.into_input();
        edited.updated_at = deleted_at;
        edited.deleted_at = Some(deleted_at);
        rules.insert(rule_id, AutomationRule::new(edited)?);
        Ok(true)
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryAutomationRepository {
    async fn create_running_execution(&self, rule_id: Uuid) -> AppResult<ActionExecution> {
        if !self.rules.read().await.contains_key(&rule_id) {
            return Err(AppError::Store(format!(
                "automation rule '{rule_id}' does not exist"
            )));
        }

        let execution = ActionExecution {
            id: Uuid::new_v4(),
            rule_id,
            started_at: Utc::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            objects_affected: 0,
            error_message: None,
            execution_log: None,
        };
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> AppResult<ActionExecution> {
        let execution_log = outcome.log().to_document()?;
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(&execution_id)
            .ok_or_else(|| AppError::NotFound(format!("execution '{execution_id}' not found")))?;

        if execution.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "execution '{execution_id}' is already {}",
                execution.status.as_str()
            )));
        }

        execution.status = outcome.status();
        execution.completed_at = Some(Utc::now());
        execution.objects_affected = outcome.objects_affected();
        execution.error_message = outcome.error_message().map(ToOwned::to_owned);
        execution.execution_log = Some(execution_log);
        Ok(execution.clone())
    }

    async fn delete_executions_started_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut executions = self.executions.write().await;
        let before = executions.len();
        executions.retain(|_, execution| execution.started_at >= cutoff);
        Ok((before - executions.len()) as u64)
    }

    async fn list_executions(
        &self,
        rule_id: Uuid,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        let executions = self.executions.read().await;
        Ok(executions_of(&executions, rule_id)
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn count_executions(&self, rule_id: Uuid) -> AppResult<u64> {
        let executions = self.executions.read().await;
        Ok(executions
            .values()
            .filter(|execution| execution.rule_id == rule_id)
            .count() as u64)
    }

    async fn latest_execution(&self, rule_id: Uuid) -> AppResult<Option<ActionExecution>> {
        let executions = self.executions.read().await;
        Ok(executions_of(&executions, rule_id).into_iter().next())
    }
}
