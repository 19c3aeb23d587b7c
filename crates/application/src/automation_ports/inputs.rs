use corvid_core::{AppError, OrgId};
use corvid_domain::{ExecutionLog, ExecutionStatus};
use serde_json::Value;
use uuid::Uuid;

/// Repository payload for creating one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAutomationRuleInput {
    /// Owning organization.
    pub org_id: OrgId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Opaque filter document.
    pub filter_config: Value,
    /// Opaque action document.
    pub action_config: Value,
    /// Whether the scheduler may select the rule.
    pub is_active: bool,
    /// Creating member.
    pub created_by: Uuid,
}

/// Repository payload for updating one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAutomationRuleInput {
    /// Rule identifier.
    pub rule_id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Opaque filter document.
    pub filter_config: Value,
    /// Opaque action document.
    pub action_config: Value,
    /// Whether the scheduler may select the rule.
    pub is_active: bool,
}

/// Rule listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationRuleListQuery {
    /// Optional case-insensitive match on name or description.
    pub search: Option<String>,
    /// Page size.
    pub limit: usize,
    /// Row offset.
    pub offset: usize,
}

/// Execution history listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionListQuery {
    /// Page size.
    pub limit: usize,
    /// Row offset.
    pub offset: usize,
}

/// Terminal result written when an execution finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Rule-run finished without errors.
    Completed {
        /// Objects actually mutated.
        objects_affected: u32,
        /// Audit summary.
        log: ExecutionLog,
    },
    /// Rule-run finished with an error; partial mutations stay counted.
    Failed {
        /// Error recorded on the execution.
        error_message: String,
        /// Objects mutated before the failure.
        objects_affected: u32,
        /// Audit summary.
        log: ExecutionLog,
    },
}

impl ExecutionOutcome {
    /// Builds a failed outcome from an application error.
    #[must_use]
    pub fn failed(error: &AppError, objects_affected: u32, mut log: ExecutionLog) -> Self {
        let error_message = error.to_string();
        log.error = Some(error_message.clone());
        Self::Failed {
            error_message,
            objects_affected,
            log,
        }
    }

    /// Returns the terminal status stored for this outcome.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Completed { .. } => ExecutionStatus::Completed,
            Self::Failed { .. } => ExecutionStatus::Failed,
        }
    }

    /// Returns mutated object count.
    #[must_use]
    pub fn objects_affected(&self) -> u32 {
        match self {
            Self::Completed {
                objects_affected, ..
            }
            | Self::Failed {
                objects_affected, ..
            } => *objects_affected,
        }
    }

    /// Returns the error message for failed outcomes.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error_message, .. } => Some(error_message.as_str()),
        }
    }

    /// Returns the audit summary.
    #[must_use]
    pub fn log(&self) -> &ExecutionLog {
        match self {
            Self::Completed { log, .. } | Self::Failed { log, .. } => log,
        }
    }
}
