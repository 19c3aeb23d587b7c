use super::*;

impl PostgresAutomationRepository {
    pub(super) async fn create_running_execution_impl(
        &self,
        rule_id: Uuid,
    ) -> AppResult<ActionExecution> {
        let row = sqlx::query_as::<_, ActionExecutionRow>(&format!(
            r#"
            INSERT INTO automated_action_executions (id, rule_id, status)
            VALUES ($1, $2, 'running')
            RETURNING {EXECUTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(rule_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to start execution for automation rule '{rule_id}': {error}"
            ))
        })?;

        ActionExecution::try_from(row)
    }

    pub(super) async fn complete_execution_impl(
        &self,
        execution_id: Uuid,
        outcome: &ExecutionOutcome,
    ) -> AppResult<ActionExecution> {
        let objects_affected = i32::try_from(outcome.objects_affected()).map_err(|error| {
            AppError::Validation(format!("invalid objects_affected: {error}"))
        })?;
        let execution_log = outcome.log().to_document()?;

        let row = sqlx::query_as::<_, ActionExecutionRow>(&format!(
            r#"
            UPDATE automated_action_executions
            SET status = $2,
                completed_at = now(),
                objects_affected = $3,
                error_message = $4,
                execution_log = $5
            WHERE id = $1 AND status = 'running'
            RETURNING {EXECUTION_COLUMNS}
            "#
        ))
        .bind(execution_id)
        .bind(outcome.status().as_str())
        .bind(objects_affected)
        .bind(outcome.error_message())
        .bind(execution_log)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to complete execution '{execution_id}': {error}"
            ))
        })?;

        if let Some(row) = row {
            return ActionExecution::try_from(row);
        }

        let current_status = sqlx::query_scalar::<_, String>(
            r#"
            SELECT status
            FROM automated_action_executions
            WHERE id = $1
            "#,
        )
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to load execution '{execution_id}': {error}"
            ))
        })?;

        match current_status {
            Some(status) => Err(AppError::Conflict(format!(
                "execution '{execution_id}' is already {status}"
            ))),
            None => Err(AppError::NotFound(format!(
                "execution '{execution_id}' not found"
            ))),
        }
    }

    pub(super) async fn delete_executions_started_before_impl(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM automated_action_executions
            WHERE started_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to prune automation executions: {error}"))
        })?;

        Ok(result.rows_affected())
    }

    pub(super) async fn list_executions_impl(
        &self,
        rule_id: Uuid,
        query: ExecutionListQuery,
    ) -> AppResult<Vec<ActionExecution>> {
        let limit = to_i64(query.limit, "execution list limit")?;
        let offset = to_i64(query.offset, "execution list offset")?;

        let rows = sqlx::query_as::<_, ActionExecutionRow>(&format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM automated_action_executions
            WHERE rule_id = $1
            ORDER BY started_at DESC, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(rule_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to list executions for automation rule '{rule_id}': {error}"
            ))
        })?;

        rows.into_iter().map(ActionExecution::try_from).collect()
    }

    pub(super) async fn count_executions_impl(&self, rule_id: Uuid) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM automated_action_executions
            WHERE rule_id = $1
            "#,
        )
        .bind(rule_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to count executions for automation rule '{rule_id}': {error}"
            ))
        })?;

        to_u64(count, "execution count")
    }

    pub(super) async fn latest_execution_impl(
        &self,
        rule_id: Uuid,
    ) -> AppResult<Option<ActionExecution>> {
        let row = sqlx::query_as::<_, ActionExecutionRow>(&format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM automated_action_executions
            WHERE rule_id = $1
            ORDER BY started_at DESC, id
            LIMIT 1
            "#
        ))
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to load latest execution for automation rule '{rule_id}': {error}"
            ))
        })?;

        row.map(ActionExecution::try_from).transpose()
    }
}
