//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action_config;
mod automation_rule;
mod execution;
mod filter_config;
mod object_query;

pub use action_config::{ActionConfig, FunnelPlacement};
pub use automation_rule::{AutomationRule, AutomationRuleInput};
pub use execution::{ActionExecution, ExecutionLog, ExecutionStatus, ObjectFailure};
pub use filter_config::{
    AttributePredicate, FilterConfig, FunnelStepFilter, MAX_ATTRIBUTE_PREDICATES,
};
pub use object_query::{ObjectPredicate, ObjectQuery};
