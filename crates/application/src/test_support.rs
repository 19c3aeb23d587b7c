use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use corvid_core::{AppError, AppResult, OrgId};
use corvid_domain::{
    ActionExecution, AutomationRule, AutomationRuleInput, ExecutionStatus, FunnelPlacement,
    ObjectPredicate, ObjectQuery,
};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::automation_ports::{
    AutomationRuleListQuery, AutomationRuleRepository, Clock, CreateAutomationRuleInput,
    ExecutionListQuery, ExecutionOutcome, ExecutionRepository, ObjectStore, SchedulerLease,
    SchedulerLeaseCoordinator, UpdateAutomationRuleInput,
};

pub(crate) fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 7, 30, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

pub(crate) fn rule(org_id: OrgId, filter_config: Value, action_config: Value) -> AutomationRule {
    let now = reference_now();
    AutomationRule::new(AutomationRuleInput {
        id: Uuid::new_v4(),
        org_id,
        name: "Tag VIP contacts".to_owned(),
        description: String::new(),
        filter_config,
        action_config,
        is_active: true,
        last_run_at: None,
        created_by: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
    .unwrap_or_else(|_| unreachable!())
}

pub(crate) struct FixedClock {
    base: DateTime<Utc>,
    offset_seconds: AtomicI64,
    hour: AtomicU32,
}

impl FixedClock {
    pub(crate) fn at(base: DateTime<Utc>, hour: u32) -> Self {
        Self {
            base,
            offset_seconds: AtomicI64::new(0),
            hour: AtomicU32::new(hour),
        }
    }

    pub(crate) fn advance(&self, seconds: i64) {
        self.offset_seconds.fetch_add(seconds, Ordering::SeqCst);
    }

    pub(crate) fn set_hour(&self, hour: u32) {
        self.hour.store(hour, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::seconds(self.offset_seconds.load(Ordering::SeqCst))
    }

    fn local_hour(&self) -> u32 {
        self.hour.load(Ordering::SeqCst)
    }

    fn local_date(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Default)]
pub(crate) struct FakeRuleRepository {
    pub(crate) rules: Mutex<Vec<AutomationRule>>,
    pub(crate) marked: Mutex<Vec<(Uuid, DateTime<Utc>)>>,
    pub(crate) fail_fetch: bool,
}

impl FakeRuleRepository {
    pub(crate) fn with_rules(rules: Vec<AutomationRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    pub(crate) async fn rule(&self, rule_id: Uuid) -> Option<AutomationRule> {
        self.rules
            .lock()
            .await
            .iter()
            .find(|rule| rule.id() == rule_id)
            .cloned()
    }
}

fn matches_search(rule: &AutomationRule, search: Option<&str>) -> bool {
    let Some(search) = search else {
        return true;
    };
    let needle = search.to_lowercase();
    rule.name().as_str().to_lowercase().contains(&needle)
        || rule.description().to_lowercase().contains(&needle)
}

#[async_trait]
impl AutomationRuleRepository for FakeRuleRepository {
    async fn fetch_due_rules(
        &self,
        now: DateTime<Utc>,
        throttle_window: chrono::Duration,
    ) -> AppResult<Vec<AutomationRule>> {
        if self.fail_fetch {
            return Err(AppError::Store("rules table unavailable".to_owned()));
        }

        let mut due: Vec<AutomationRule> = self
            .rules
            .lock()
            .await
            .iter()
            .filter(|rule| rule.is_due(now, throttle_window))
            .cloned()
            .collect();
        due.sort_by_key(AutomationRule::last_run_at);
        Ok(due)
    }

    async fn mark_rule_run(&self, rule_id: Uuid, ran_at: DateTime<Utc>) -> AppResult<()> {
        let mut rules = self.rules.lock().await;
        if let Some(position) = rules.iter().position(|rule| rule.id() == rule_id) {
            let updated = rules[position].clone().with_last_run_at(ran_at);
            rules[position] = updated;
        }
        self.marked.lock().await.push((rule_id, ran_at));
        Ok(())
    }

    async fn create_rule(&self, input: CreateAutomationRuleInput) -> AppResult<AutomationRule> {
        let now = reference_now();
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
        self.rules.lock().await.push(rule.clone());
        Ok(rule)
    }

    async fn find_rule(&self, org_id: OrgId, rule_id: Uuid) -> AppResult<Option<AutomationRule>> {
        Ok(self
            .rules
            .lock()
            .await
            .iter()
            .find(|rule| rule.id() == rule_id && rule.org_id() == org_id && !rule.is_deleted())
            .cloned())
    }

    async fn list_rules(
        &self,
        org_id: OrgId,
        query: &AutomationRuleListQuery,
    ) -> AppResult<Vec<AutomationRule>> {
        Ok(self
            .rules
            .lock()
            .await
            .iter()
            .filter(|rule| rule.org_id() == org_id && !rule.is_deleted())
            .filter(|rule| matches_search(rule, query.search.as_deref()))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn count_rules(&self, org_id: OrgId, search: Option<&str>) -> AppResult<u64> {
        let count = self
            .rules
            .lock()
            .await
            .iter()
            .filter(|rule| rule.org_id() == org_id && !rule.is_deleted())
            .filter(|rule| matches_search(rule, search))
            .count();
        Ok(count as u64)
    }

    async fn update_rule(
        &self,
        org_id: OrgId,
        input: UpdateAutomationRuleInput,
    ) -> AppResult<Option<AutomationRule>> {
        let mut rules = self.rules.lock().await;
        let Some(position) = rules.iter().position(|rule| {
            rule.id() == input.rule_id && rule.org_id() == org_id && !rule.is_deleted()
        }) else {
            return Ok(None);
        };

        let current = &rules[position];
        let updated = AutomationRule::new(AutomationRuleInput {
            id: current.id(),
            org_id,
            name: input.name,
            description: input.description,
            filter_config: input.filter_config,
            action_config: input.action_config,
            is_active: input.is_active,
            last_run_at: current.last_run_at(),
            created_by: current.created_by(),
            created_at: current.created_at(),
            updated_at: reference_now(),
            deleted_at: None,
        })?;
        rules[position] = updated.clone();
        Ok(Some(updated))
    }

    async fn soft_delete_rule(
        &self,
        org_id: OrgId,
        rule_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rules = self.rules.lock().await;
        let Some(position) = rules.iter().position(|rule| {
            rule.id() == rule_id && rule.org_id() == org_id && !rule.is_deleted()
        }) else {
            return Ok(false);
        };

        let current = &rules[position];
        let deleted = AutomationRule::new(AutomationRuleInput {
            id: current.id(),
            org_id,
            name: current.name().as_str().to_owned(),
            description: current.description().to_owned(),
            filter_config: current.filter_config().clone(),
            action_config: current.action_config().clone(),
            is_active: current.is_active(),
            last_run_at: current.last_run_at(),
            created_by: current.created_by(),
            created_at: current.created_at(),
            updated_at: deleted_at,
            deleted_at: Some(deleted_at),
        })?;
        rules[position] = deleted;
        Ok(true)
    }
}

#[derive(Default)]
pub(crate) struct FakeExecutionRepository {
    pub(crate) executions: Mutex<Vec<ActionExecution>>,
    pub(crate) fail_create: bool,
    pub(crate) fail_delete: bool,
    pub(crate) delete_delay: Option<Duration>,
    pub(crate) delete_calls: AtomicUsize,
}

impl FakeExecutionRepository {
    pub(crate) async fn all(&self) -> Vec<ActionExecution> {
        self.executions.lock().await.clone()
    }
}

#[async_trait]
impl ExecutionRepository for FakeExecutionRepository {
    async fn create_running_execution(&self, rule_id: Uuid) -> AppResult<ActionExecution> {
        if self.fail_create {
            return Err(AppError::Store("executions table unavailable".to_owned()));
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
        self.executions.lock().await.push(execution.clone());
        Ok(execution)
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> AppResult<ActionExecution> {
        let mut executions = self.executions.lock().await;
        let execution = executions
            .iter_mut()
            .find(|execution| execution.id == execution_id)
            .ok_or_else(|| AppError::NotFound(format!("execution '{execution_id}'")))?;

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
        execution.execution_log = Some(outcome.log().to_document()?);
        Ok(execution.clone())
    }

    async fn delete_executions_started_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_delete {
            return Err(AppError::Store("delete failed".to_owned()));
        }

        let mut executions = self.executions.lock().await;
        let before = executions.len();
        executions.retain(|execution| execution.started_at >= cutoff);
        Ok((before - executions.len()) as u64)
    }

    async fn list_executions(
        &self,
        rule_id: Uuid,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        let mut executions: Vec<ActionExecution> = self
            .executions
            .lock()
            .await
            .iter()
            .filter(|execution| execution.rule_id == rule_id)
            .cloned()
            .collect();
        executions.sort_by(|left, right| right.started_at.cmp(&left.started_at));
        Ok(executions
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn count_executions(&self, rule_id: Uuid) -> AppResult<u64> {
        Ok(self
            .executions
            .lock()
            .await
            .iter()
            .filter(|execution| execution.rule_id == rule_id)
            .count() as u64)
    }

    async fn latest_execution(&self, rule_id: Uuid) -> AppResult<Option<ActionExecution>> {
        Ok(self
            .executions
            .lock()
            .await
            .iter()
            .filter(|execution| execution.rule_id == rule_id)
            .max_by_key(|execution| execution.started_at)
            .cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeObject {
    pub(crate) org_id: OrgId,
    pub(crate) tags: BTreeSet<Uuid>,
    pub(crate) funnel_steps: BTreeMap<Uuid, Uuid>,
}

/// Object store that only understands tag clauses and records its peak concurrency.
#[derive(Default)]
pub(crate) struct FakeObjectStore {
    pub(crate) objects: Mutex<HashMap<Uuid, FakeObject>>,
    pub(crate) first_steps: HashMap<Uuid, Uuid>,
    pub(crate) query_delay: Option<Duration>,
    pub(crate) failing_objects: BTreeSet<Uuid>,
    pub(crate) fail_queries: bool,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) peak_in_flight: AtomicUsize,
    pub(crate) query_count: AtomicUsize,
}

impl FakeObjectStore {
    pub(crate) async fn insert(&self, org_id: OrgId, tags: &[Uuid]) -> Uuid {
        let object_id = Uuid::new_v4();
        self.objects.lock().await.insert(
            object_id,
            FakeObject {
                org_id,
                tags: tags.iter().copied().collect(),
                funnel_steps: BTreeMap::new(),
            },
        );
        object_id
    }

    pub(crate) async fn tags_of(&self, object_id: Uuid) -> BTreeSet<Uuid> {
        self.objects
            .lock()
            .await
            .get(&object_id)
            .map(|object| object.tags.clone())
            .unwrap_or_default()
    }

    pub(crate) async fn step_of(&self, object_id: Uuid, funnel_id: Uuid) -> Option<Uuid> {
        self.objects
            .lock()
            .await
            .get(&object_id)
            .and_then(|object| object.funnel_steps.get(&funnel_id).copied())
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn objects_matching(&self, query: &ObjectQuery) -> AppResult<Vec<Uuid>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_queries {
            return Err(AppError::Store("object query failed".to_owned()));
        }

        let objects = self.objects.lock().await;
        let mut matched = Vec::new();
        for (object_id, object) in objects.iter() {
            if object.org_id != query.org_id() {
                continue;
            }

            let mut keep = true;
            for clause in query.clauses() {
                match clause {
                    ObjectPredicate::HasAnyTag(tag_ids) => {
                        keep &= tag_ids.iter().any(|tag_id| object.tags.contains(tag_id));
                    }
                    other => {
                        return Err(AppError::Store(format!(
                            "fake store does not support '{}' clauses",
                            other.kind()
                        )));
                    }
                }
            }

            if keep {
                matched.push(*object_id);
            }
        }

        Ok(matched)
    }

    async fn tag_object(&self, org_id: OrgId, object_id: Uuid, tag_id: Uuid) -> AppResult<bool> {
        if self.failing_objects.contains(&object_id) {
            return Err(AppError::Store(format!("object '{object_id}' is locked")));
        }

        let mut objects = self.objects.lock().await;
        let object = objects
            .get_mut(&object_id)
            .filter(|object| object.org_id == org_id)
            .ok_or_else(|| AppError::Store(format!("object '{object_id}' not found")))?;
        Ok(object.tags.insert(tag_id))
    }

    async fn place_on_funnel_step(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        placement: &FunnelPlacement,
        _actor_id: Uuid,
    ) -> AppResult<bool> {
        if self.failing_objects.contains(&object_id) {
            return Err(AppError::Store(format!("object '{object_id}' is locked")));
        }

        let step_id = match placement.step_id() {
            Some(step_id) => step_id,
            None => self
                .first_steps
                .get(&placement.funnel_id())
                .copied()
                .ok_or_else(|| {
                    AppError::Store(format!("funnel '{}' has no steps", placement.funnel_id()))
                })?,
        };

        let mut objects = self.objects.lock().await;
        let object = objects
            .get_mut(&object_id)
            .filter(|object| object.org_id == org_id)
            .ok_or_else(|| AppError::Store(format!("object '{object_id}' not found")))?;
        if object.funnel_steps.contains_key(&placement.funnel_id()) {
            return Ok(false);
        }

        object.funnel_steps.insert(placement.funnel_id(), step_id);
        Ok(true)
    }
}

#[derive(Default)]
pub(crate) struct FakeLeaseCoordinator {
    pub(crate) held_elsewhere: bool,
    pub(crate) acquired: AtomicUsize,
    pub(crate) released: AtomicUsize,
}

#[async_trait]
impl SchedulerLeaseCoordinator for FakeLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<SchedulerLease>> {
        if self.held_elsewhere {
            return Ok(None);
        }

        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Some(SchedulerLease {
            scope_key: scope_key.to_owned(),
            token: Uuid::new_v4().to_string(),
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, _lease: &SchedulerLease) -> AppResult<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
