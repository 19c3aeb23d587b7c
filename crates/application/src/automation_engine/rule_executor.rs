use std::sync::Arc;

use corvid_core::{AppError, AppResult};
use corvid_domain::{ActionConfig, ActionExecution, AutomationRule, ExecutionLog, FilterConfig};
use tracing::{info, warn};

use crate::automation_ports::{AutomationRuleRepository, Clock, ExecutionOutcome};

use super::{ActionApplier, ExecutionRecorder, FilterEvaluator, RunBudget};

/// Result of one rule-run.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRunOutcome {
    /// Rule configuration could not be decoded; no execution was written.
    Skipped {
        /// Decode error.
        reason: AppError,
    },
    /// Execution finished as completed.
    Completed(ActionExecution),
    /// Execution finished as failed.
    Failed {
        /// Terminal execution record.
        execution: ActionExecution,
        /// Error that failed the run.
        error: AppError,
    },
}

struct DecodedRule {
    filter: FilterConfig,
    action: ActionConfig,
}

struct RunResult {
    log: ExecutionLog,
    objects_affected: u32,
    error: Option<AppError>,
}

/// Runs one rule end to end: decode, record, evaluate, apply, finish.
#[derive(Clone)]
pub struct RuleExecutor {
    rule_repository: Arc<dyn AutomationRuleRepository>,
    evaluator: FilterEvaluator,
    applier: ActionApplier,
    recorder: ExecutionRecorder,
    clock: Arc<dyn Clock>,
}

impl RuleExecutor {
    /// Creates a rule executor.
    #[must_use]
    pub fn new(
        rule_repository: Arc<dyn AutomationRuleRepository>,
        evaluator: FilterEvaluator,
        applier: ActionApplier,
        recorder: ExecutionRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rule_repository,
            evaluator,
            applier,
            recorder,
            clock,
        }
    }

    /// Runs `rule` within `budget`.
    ///
    /// Every begun execution is moved to a terminal state and the rule's
    /// last-run marker is advanced whatever the outcome. Both writes happen
    /// outside the budget.
    pub async fn run(&self, rule: &AutomationRule, budget: RunBudget) -> AppResult<RuleRunOutcome> {
        let decoded = match decode(rule) {
            Ok(decoded) => decoded,
            Err(reason) => {
                warn!(
                    rule_id = %rule.id(),
                    org_id = %rule.org_id(),
                    error = %reason,
                    "skipping automation rule with invalid configuration"
                );
                self.mark_last_run(rule).await?;
                return Ok(RuleRunOutcome::Skipped { reason });
            }
        };

        let execution = match budget
            .bound("execution start", self.recorder.begin(rule.id()))
            .await
        {
            Ok(execution) => execution,
            Err(error) => {
                if let Err(mark_error) = self.mark_last_run(rule).await {
                    warn!(rule_id = %rule.id(), error = %mark_error, "failed to mark automation rule run");
                }
                return Err(error);
            }
        };

        let result = self.evaluate_and_apply(rule, &decoded, &budget).await;
        let outcome = match result.error {
            None => ExecutionOutcome::Completed {
                objects_affected: result.objects_affected,
                log: result.log,
            },
            Some(ref error) => ExecutionOutcome::failed(error, result.objects_affected, result.log),
        };

        let completed = self.recorder.complete(execution.id, &outcome).await;
        let marked = self.mark_last_run(rule).await;

        let completed = completed?;
        marked?;

        match result.error {
            None => {
                info!(
                    rule_id = %rule.id(),
                    org_id = %rule.org_id(),
                    execution_id = %completed.id,
                    objects_affected = completed.objects_affected,
                    "automation rule completed"
                );
                Ok(RuleRunOutcome::Completed(completed))
            }
            Some(error) => {
                warn!(
                    rule_id = %rule.id(),
                    org_id = %rule.org_id(),
                    execution_id = %completed.id,
                    objects_affected = completed.objects_affected,
                    error = %error,
                    "automation rule failed"
                );
                Ok(RuleRunOutcome::Failed {
                    execution: completed,
                    error,
                })
            }
        }
    }

    async fn evaluate_and_apply(
        &self,
        rule: &AutomationRule,
        decoded: &DecodedRule,
        budget: &RunBudget,
    ) -> RunResult {
        let mut log = ExecutionLog::default();

        let matched = match budget
            .bound(
                "filter evaluation",
                self.evaluator.evaluate(rule.org_id(), &decoded.filter),
            )
            .await
        {
            Ok(matched) => matched,
            Err(error) => {
                return RunResult {
                    log,
                    objects_affected: 0,
                    error: Some(error),
                };
            }
        };
        log.matched_objects = matched.len();

        if let Err(error) = budget.ensure_remaining("action apply") {
            return RunResult {
                log,
                objects_affected: 0,
                error: Some(error),
            };
        }

        let summary = self
            .applier
            .apply(
                rule.org_id(),
                &matched,
                &decoded.action,
                rule.created_by(),
                budget,
            )
            .await;
        summary.write_into(&mut log);

        RunResult {
            objects_affected: summary.objects_affected(),
            error: summary.run_error(),
            log,
        }
    }

    async fn mark_last_run(&self, rule: &AutomationRule) -> AppResult<()> {
        self.rule_repository
            .mark_rule_run(rule.id(), self.clock.now())
            .await
    }
}

fn decode(rule: &AutomationRule) -> AppResult<DecodedRule> {
    Ok(DecodedRule {
        filter: FilterConfig::from_document(rule.filter_config())?,
        action: ActionConfig::from_document(rule.action_config())?,
    })
}
