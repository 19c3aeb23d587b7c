use chrono::{DateTime, Duration, Utc};
use corvid_core::{AppResult, NonEmptyString, OrgId};
use serde_json::Value;
use uuid::Uuid;

/// Organization-owned "when objects match a filter, apply an action" rule.
///
/// Filter and action documents are kept in their stored JSON form and decoded
/// at execution time, so a rule with a malformed document can still be saved
/// and listed.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationRule {
    id: Uuid,
    org_id: OrgId,
    name: NonEmptyString,
    description: String,
    filter_config: Value,
    action_config: Value,
    is_active: bool,
    last_run_at: Option<DateTime<Utc>>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

/// Input payload for constructing one automation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationRuleInput {
    /// Stable rule identifier.
    pub id: Uuid,
    /// Owning organization.
    pub org_id: OrgId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Stored filter document.
    pub filter_config: Value,
    /// Stored action document.
    pub action_config: Value,
    /// Whether the scheduler may select the rule.
    pub is_active: bool,
    /// Completion time of the latest execution attempt.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Member that created the rule.
    pub created_by: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AutomationRule {
    /// Creates a validated automation rule.
    pub fn new(input: AutomationRuleInput) -> AppResult<Self> {
        Ok(Self {
            id: input.id,
            org_id: input.org_id,
            name: NonEmptyString::new(input.name)?,
            description: input.description,
            filter_config: input.filter_config,
            action_config: input.action_config,
            is_active: input.is_active,
            last_run_at: input.last_run_at,
            created_by: input.created_by,
            created_at: input.created_at,
            updated_at: input.updated_at,
            deleted_at: input.deleted_at,
        })
    }

    /// Returns the rule identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the stored filter document.
    #[must_use]
    pub fn filter_config(&self) -> &Value {
        &self.filter_config
    }

    /// Returns the stored action document.
    #[must_use]
    pub fn action_config(&self) -> &Value {
        &self.action_config
    }

    /// Returns whether the rule is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the completion time of the latest execution attempt.
    #[must_use]
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    /// Returns the creating member.
    #[must_use]
    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the soft-delete timestamp.
    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns whether the rule is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns whether the scheduler may run this rule at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>, throttle_window: Duration) -> bool {
        if !self.is_active || self.is_deleted() {
            return false;
        }

        match self.last_run_at {
            None => true,
            Some(last_run_at) => now.signed_duration_since(last_run_at) >= throttle_window,
        }
    }

    /// Returns a copy with the last-run marker moved to `at`.
    #[must_use]
    pub fn with_last_run_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_run_at = Some(at);
        self
    }

    /// Converts the rule back into its constructor input for edits.
    #[must_use]
    pub fn into_input(self) -> AutomationRuleInput {
        AutomationRuleInput {
            id: self.id,
            org_id: self.org_id,
            name: self.name.into(),
            description: self.description,
            filter_config: self.filter_config,
            action_config: self.action_config,
            is_active: self.is_active,
            last_run_at: self.last_run_at,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use corvid_core::OrgId;
    use proptest::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    use super::{AutomationRule, AutomationRuleInput};

    fn rule_input(
        is_active: bool,
        last_run_minutes_ago: Option<i64>,
        deleted: bool,
    ) -> AutomationRuleInput {
        let now = reference_now();
        AutomationRuleInput {
            id: Uuid::new_v4(),
            org_id: OrgId::new(),
            name: "Tag VIPs".to_owned(),
            description: String::new(),
            filter_config: json!({"tag_ids": []}),
            action_config: json!({}),
            is_active,
            last_run_at: last_run_minutes_ago.map(|minutes| now - Duration::minutes(minutes)),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            deleted_at: deleted.then_some(now),
        }
    }

    fn reference_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    #[test]
    fn rule_requires_name() {
        let mut input = rule_input(true, None, false);
        input.name = "  ".to_owned();
        assert!(AutomationRule::new(input).is_err());
    }

    #[test]
    fn throttle_window_excludes_recent_runs() {
        let window = Duration::minutes(10);
        let recent = AutomationRule::new(rule_input(true, Some(5), false));
        let stale = AutomationRule::new(rule_input(true, Some(11), false));
        assert!(recent.is_ok() && stale.is_ok());

        let recent = recent.unwrap_or_else(|_| unreachable!());
        let stale = stale.unwrap_or_else(|_| unreachable!());
        assert!(!recent.is_due(reference_now(), window));
        assert!(stale.is_due(reference_now(), window));
    }

    #[test]
    fn never_run_rule_is_due() {
        let rule = AutomationRule::new(rule_input(true, None, false));
        assert!(
            rule.unwrap_or_else(|_| unreachable!())
                .is_due(reference_now(), Duration::minutes(10))
        );
    }

    proptest! {
        #[test]
        fn inactive_or_deleted_rules_are_never_due(
            is_active in any::<bool>(),
            deleted in any::<bool>(),
            last_run in proptest::option::of(0_i64..10_000),
            window_minutes in 0_i64..120,
        ) {
            prop_assume!(!is_active || deleted);
            let rule = AutomationRule::new(rule_input(is_active, last_run, deleted))
                .unwrap_or_else(|_| unreachable!());
            prop_assert!(!rule.is_due(reference_now(), Duration::minutes(window_minutes)));
        }

        #[test]
        fn active_rule_due_iff_window_elapsed(
            last_run in 0_i64..10_000,
            window_minutes in 0_i64..120,
        ) {
            let rule = AutomationRule::new(rule_input(true, Some(last_run), false))
                .unwrap_or_else(|_| unreachable!());
            prop_assert_eq!(
                rule.is_due(reference_now(), Duration::minutes(window_minutes)),
                last_run >= window_minutes
            );
        }
    }
}
