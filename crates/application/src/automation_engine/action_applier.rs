use std::collections::BTreeSet;
use std::sync::Arc;

use corvid_core::{AppError, AppResult, OrgId};
use corvid_domain::{ActionConfig, ExecutionLog, FunnelPlacement, ObjectFailure};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::automation_ports::ObjectStore;

use super::RunBudget;

/// Result of applying one action to a set of objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedSummary {
    /// Objects that newly received the tag.
    pub tagged: Vec<Uuid>,
    /// Objects newly placed on the funnel step.
    pub stepped: Vec<Uuid>,
    /// Objects whose mutation failed.
    pub failures: Vec<ObjectFailure>,
    /// Deadline error that stopped the loop early.
    pub interrupted: Option<AppError>,
    first_failure: Option<AppError>,
}

impl AppliedSummary {
    /// Returns the number of distinct objects actually mutated.
    #[must_use]
    pub fn objects_affected(&self) -> u32 {
        let affected: BTreeSet<&Uuid> = self.tagged.iter().chain(self.stepped.iter()).collect();
        u32::try_from(affected.len()).unwrap_or(u32::MAX)
    }

    /// Returns the error that fails the rule-run, preferring the first per-object failure.
    #[must_use]
    pub fn run_error(&self) -> Option<AppError> {
        self.first_failure
            .clone()
            .or_else(|| self.interrupted.clone())
    }

    /// Copies the mutation details into an execution log.
    pub fn write_into(&self, log: &mut ExecutionLog) {
        log.tagged = self.tagged.clone();
        log.stepped = self.stepped.clone();
        log.failures = self.failures.clone();
    }

    fn record_failure(&mut self, object_id: Uuid, error: AppError) {
        self.failures.push(ObjectFailure {
            object_id,
            error: error.to_string(),
        });
        if self.first_failure.is_none() {
            self.first_failure = Some(error);
        }
    }
}

/// Applies rule actions to matched objects through the object store.
#[derive(Clone)]
pub struct ActionApplier {
    store: Arc<dyn ObjectStore>,
}

impl ActionApplier {
    /// Creates an applier over an object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Applies `action` to every object in order.
    ///
    /// Per-object failures are collected and do not stop the batch. An expired
    /// budget stops the loop and is reported through `interrupted`.
    pub async fn apply(
        &self,
        org_id: OrgId,
        object_ids: &BTreeSet<Uuid>,
        action: &ActionConfig,
        actor_id: Uuid,
        budget: &RunBudget,
    ) -> AppliedSummary {
        let mut summary = AppliedSummary::default();

        for object_id in object_ids.iter().copied() {
            if let Err(error) = budget.ensure_remaining("action apply") {
                summary.interrupted = Some(error);
                break;
            }

            if let Some(tag_id) = action.tag_id() {
                match budget
                    .bound("tag_object", self.store.tag_object(org_id, object_id, tag_id))
                    .await
                {
                    Ok(true) => summary.tagged.push(object_id),
                    Ok(false) => {}
                    Err(error) if error.is_timeout() => {
                        summary.interrupted = Some(error);
                        break;
                    }
                    Err(error) => {
                        warn!(%org_id, %object_id, %tag_id, error = %error, "failed to tag object");
                        summary.record_failure(object_id, error);
                    }
                }
            }

            if let Some(placement) = action.funnel_placement() {
                match self.place(org_id, object_id, placement, actor_id, budget).await {
                    Ok(true) => summary.stepped.push(object_id),
                    Ok(false) => {}
                    Err(error) if error.is_timeout() => {
                        summary.interrupted = Some(error);
                        break;
                    }
                    Err(error) => {
                        warn!(
                            %org_id,
                            %object_id,
                            funnel_id = %placement.funnel_id(),
                            error = %error,
                            "failed to place object on funnel step"
                        );
                        summary.record_failure(object_id, error);
                    }
                }
            }
        }

        debug!(
            %org_id,
            tagged = summary.tagged.len(),
            stepped = summary.stepped.len(),
            failures = summary.failures.len(),
            interrupted = summary.interrupted.is_some(),
            "applied automation action"
        );

        summary
    }

    async fn place(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        placement: &FunnelPlacement,
        actor_id: Uuid,
        budget: &RunBudget,
    ) -> AppResult<bool> {
        budget
            .bound(
                "place_on_funnel_step",
                self.store
                    .place_on_funnel_step(org_id, object_id, placement, actor_id),
            )
            .await
    }
}
