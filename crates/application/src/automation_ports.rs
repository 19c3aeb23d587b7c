mod clock;
mod inputs;
mod lease;
mod object_store;
mod repository;

pub use clock::{Clock, SystemClock};
pub use inputs::{
    AutomationRuleListQuery, CreateAutomationRuleInput, ExecutionListQuery, ExecutionOutcome,
    UpdateAutomationRuleInput,
};
pub use lease::{SchedulerLease, SchedulerLeaseCoordinator};
pub use object_store::ObjectStore;
pub use repository::{AutomationRuleRepository, ExecutionRepository};
