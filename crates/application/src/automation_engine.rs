mod action_applier;
mod execution_recorder;
mod filter_evaluator;
mod rule_executor;
mod run_budget;
mod scheduler;

pub use action_applier::{ActionApplier, AppliedSummary};
pub use execution_recorder::ExecutionRecorder;
pub use filter_evaluator::FilterEvaluator;
pub use rule_executor::{RuleExecutor, RuleRunOutcome};
pub use run_budget::RunBudget;
pub use scheduler::{
    AutomationScheduler, AutomationSchedulerConfig, SCHEDULER_LEASE_SCOPE, SchedulerState,
    TickReport,
};
