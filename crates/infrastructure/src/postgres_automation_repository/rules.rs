use super::*;

impl PostgresAutomationRepository {
    pub(super) async fn fetch_due_rules_impl(
        &self,
        now: DateTime<Utc>,
        throttle_window: chrono::Duration,
    ) -> AppResult<Vec<AutomationRule>> {
        let last_run_cutoff = now - throttle_window;
        let rows = sqlx::query_as::<_, AutomationRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automated_actions
            WHERE is_active = TRUE
              AND deleted_at IS NULL
              AND (last_run_at IS NULL OR last_run_at <= $1)
            ORDER BY last_run_at ASC NULLS FIRST, created_at ASC
            "#
        ))
        .bind(last_run_cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to fetch due automation rules: {error}")))?;

        rows.into_iter().map(AutomationRule::try_from).collect()
    }

    pub(super) async fn mark_rule_run_impl(
        &self,
        rule_id: Uuid,
        ran_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE automated_actions
            SET last_run_at = $2
            WHERE id = $1
            "#,
        )
        .bind(rule_id)
        .bind(ran_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to mark automation rule '{rule_id}' as run: {error}"
            ))
        })?;

        Ok(())
    }

    pub(super) async fn create_rule_impl(
        &self,
        input: CreateAutomationRuleInput,
    ) -> AppResult<AutomationRule> {
        let row = sqlx::query_as::<_, AutomationRuleRow>(&format!(
            r#"
            INSERT INTO automated_actions (
                id,
                org_id,
                name,
                description,
                filter_config,
                action_config,
                is_active,
                created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.org_id.as_uuid())
        .bind(input.name)
        .bind(input.description)
        .bind(input.filter_config)
        .bind(input.action_config)
        .bind(input.is_active)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to create automation rule: {error}")))?;

        AutomationRule::try_from(row)
    }

    pub(super) async fn find_rule_impl(
        &self,
        org_id: OrgId,
        rule_id: Uuid,
    ) -> AppResult<Option<AutomationRule>> {
        let row = sqlx::query_as::<_, AutomationRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automated_actions
            WHERE org_id = $1 AND id = $2 AND deleted_at IS NULL
            "#
        ))
        .bind(org_id.as_uuid())
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to find automation rule '{rule_id}': {error}"
            ))
        })?;

        row.map(AutomationRule::try_from).transpose()
    }

    pub(super) async fn list_rules_impl(
        &self,
        org_id: OrgId,
        query: &AutomationRuleListQuery,
    ) -> AppResult<Vec<AutomationRule>> {
        let limit = to_i64(query.limit, "automation rule list limit")?;
        let offset = to_i64(query.offset, "automation rule list offset")?;

        let rows = sqlx::query_as::<_, AutomationRuleRow>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automated_actions
            WHERE org_id = $1
              AND deleted_at IS NULL
              AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(org_id.as_uuid())
        .bind(search_pattern(query.search.as_deref()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list automation rules: {error}")))?;

        rows.into_iter().map(AutomationRule::try_from).collect()
    }

    pub(super) async fn count_rules_impl(
        &self,
        org_id: OrgId,
        search: Option<&str>,
    ) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM automated_actions
            WHERE org_id = $1
              AND deleted_at IS NULL
              AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
            "#,
        )
        .bind(org_id.as_uuid())
        .bind(search_pattern(search))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to count automation rules: {error}")))?;

        to_u64(count, "automation rule count")
    }

    pub(super) async fn update_rule_impl(
        &self,
        org_id: OrgId,
        input: UpdateAutomationRuleInput,
    ) -> AppResult<Option<AutomationRule>> {
        let rule_id = input.rule_id;
        let row = sqlx::query_as::<_, AutomationRuleRow>(&format!(
            r#"
            UPDATE automated_actions
            SET name = $3,
                description = $4,
                filter_config = $5,
                action_config = $6,
                is_active = $7,
                updated_at = now()
            WHERE org_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(org_id.as_uuid())
        .bind(rule_id)
        .bind(input.name)
        .bind(input.description)
        .bind(input.filter_config)
        .bind(input.action_config)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to update automation rule '{rule_id}': {error}"
            ))
        })?;

        row.map(AutomationRule::try_from).transpose()
    }

    pub(super) async fn soft_delete_rule_impl(
        &self,
        org_id: OrgId,
        rule_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE automated_actions
            SET deleted_at = $3, updated_at = $3
            WHERE org_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(org_id.as_uuid())
        .bind(rule_id)
        .bind(deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to delete automation rule '{rule_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }
}
