use chrono::{DateTime, Utc};
use corvid_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of one rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution started and has not finished yet.
    Running,
    /// Execution finished without errors.
    Completed,
    /// Execution finished with an error.
    Failed,
}

impl ExecutionStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown execution status '{value}'"
            ))),
        }
    }

    /// Returns true for states with no outgoing transition.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Persisted record of one attempt to run a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionExecution {
    /// Execution identifier.
    pub id: Uuid,
    /// Rule that owns the execution.
    pub rule_id: Uuid,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp once terminal.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: ExecutionStatus,
    /// Number of objects actually mutated.
    pub objects_affected: u32,
    /// Failure details for failed executions.
    pub error_message: Option<String>,
    /// Structured audit payload.
    pub execution_log: Option<Value>,
}

/// Per-object failure captured while applying an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    /// Object that could not be mutated.
    pub object_id: Uuid,
    /// Error description.
    pub error: String,
}

/// Audit summary stored with each finished execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Number of objects matched by the filter.
    pub matched_objects: usize,
    /// Objects that received the configured tag.
    pub tagged: Vec<Uuid>,
    /// Objects placed on the configured funnel step.
    pub stepped: Vec<Uuid>,
    /// Objects whose mutation failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ObjectFailure>,
    /// Run-level error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionLog {
    /// Serializes the log into its stored JSON shape.
    pub fn to_document(&self) -> AppResult<Value> {
        serde_json::to_value(self).map_err(|error| {
            AppError::Internal(format!("failed to serialize execution log: {error}"))
        })
    }
}
