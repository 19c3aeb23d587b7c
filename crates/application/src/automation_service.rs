use std::sync::Arc;

use corvid_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use corvid_domain::{ActionExecution, AutomationRule};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::automation_ports::{
    AutomationRuleListQuery, AutomationRuleRepository, Clock, CreateAutomationRuleInput,
    ExecutionListQuery, ExecutionRepository, UpdateAutomationRuleInput,
};

mod executions;
mod rules;

/// Largest page size accepted by list operations.
pub const MAX_PAGE_SIZE: usize = 100;

/// Input payload for creating or replacing one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveAutomationRuleInput {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Filter document, stored as-is.
    pub filter_config: Value,
    /// Action document, stored as-is.
    pub action_config: Value,
    /// Whether the scheduler may select the rule.
    pub is_active: bool,
}

/// One rule with its most recent execution.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationRuleSummary {
    /// Rule definition.
    pub rule: AutomationRule,
    /// Latest execution, if the rule ever ran.
    pub last_execution: Option<ActionExecution>,
}

/// One page of rules.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationRulePage {
    /// Rules on this page.
    pub entries: Vec<AutomationRuleSummary>,
    /// Matching rules across all pages.
    pub total_count: u64,
}

/// One page of executions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPage {
    /// Executions on this page, newest first.
    pub entries: Vec<ActionExecution>,
    /// Executions of the rule across all pages.
    pub total_count: u64,
}

/// Organization-scoped management of automation rules and their history.
#[derive(Clone)]
pub struct AutomationService {
    rule_repository: Arc<dyn AutomationRuleRepository>,
    execution_repository: Arc<dyn ExecutionRepository>,
    clock: Arc<dyn Clock>,
}

impl AutomationService {
    /// Creates an automation service.
    #[must_use]
    pub fn new(
        rule_repository: Arc<dyn AutomationRuleRepository>,
        execution_repository: Arc<dyn ExecutionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rule_repository,
            execution_repository,
            clock,
        }
    }

    async fn require_rule(&self, actor: &UserIdentity, rule_id: Uuid) -> AppResult<AutomationRule> {
        self.rule_repository
            .find_rule(actor.org_id(), rule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("automation rule '{rule_id}' not found")))
    }
}

fn validate_page(limit: usize) -> AppResult<()> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
        )));
    }

    Ok(())
}

fn validate_document(field: &str, document: &Value) -> AppResult<()> {
    if !document.is_object() {
        return Err(AppError::Validation(format!(
            "{field} must be a JSON object"
        )));
    }

    Ok(())
}

fn validated_save_input(input: SaveAutomationRuleInput) -> AppResult<SaveAutomationRuleInput> {
    let name = NonEmptyString::new(input.name.trim())?;
    validate_document("filter_config", &input.filter_config)?;
    validate_document("action_config", &input.action_config)?;

    Ok(SaveAutomationRuleInput {
        name: name.as_str().to_owned(),
        description: input.description.trim().to_owned(),
        ..input
    })
}

fn normalized_search(search: Option<String>) -> Option<String> {
    search
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn log_rule_saved(action: &str, actor: &UserIdentity, rule: &AutomationRule) {
    info!(
        rule_id = %rule.id(),
        org_id = %rule.org_id(),
        user_id = %actor.user_id(),
        is_active = rule.is_active(),
        "automation rule {action}"
    );
}

fn create_input(actor: &UserIdentity, input: SaveAutomationRuleInput) -> CreateAutomationRuleInput {
    CreateAutomationRuleInput {
        org_id: actor.org_id(),
        name: input.name,
        description: input.description,
        filter_config: input.filter_config,
        action_config: input.action_config,
        is_active: input.is_active,
        created_by: actor.user_id(),
    }
}

fn update_input(rule_id: Uuid, input: SaveAutomationRuleInput) -> UpdateAutomationRuleInput {
    UpdateAutomationRuleInput {
        rule_id,
        name: input.name,
        description: input.description,
        filter_config: input.filter_config,
        action_config: input.action_config,
        is_active: input.is_active,
    }
}

fn list_query(query: AutomationRuleListQuery) -> AppResult<AutomationRuleListQuery> {
    validate_page(query.limit)?;
    Ok(AutomationRuleListQuery {
        search: normalized_search(query.search),
        ..query
    })
}

fn execution_query(query: ExecutionListQuery) -> AppResult<ExecutionListQuery> {
    validate_page(query.limit)?;
    Ok(query)
}
