//! Application services and ports.

#![forbid(unsafe_code)]

mod automation_engine;
mod automation_ports;
mod automation_service;

#[cfg(test)]
mod test_support;

pub use automation_engine::{
    ActionApplier, AppliedSummary, AutomationScheduler, AutomationSchedulerConfig,
    ExecutionRecorder, FilterEvaluator, RuleExecutor, RuleRunOutcome, RunBudget,
    SCHEDULER_LEASE_SCOPE, SchedulerState, TickReport,
};
pub use automation_ports::{
    AutomationRuleListQuery, AutomationRuleRepository, Clock, CreateAutomationRuleInput,
    ExecutionListQuery, ExecutionOutcome, ExecutionRepository, ObjectStore, SchedulerLease,
    SchedulerLeaseCoordinator, SystemClock, UpdateAutomationRuleInput,
};
pub use automation_service::{
    AutomationRulePage, AutomationRuleSummary, AutomationService, ExecutionPage, MAX_PAGE_SIZE,
    SaveAutomationRuleInput,
};
