use super::*;

impl PostgresObjectStore {
    pub(super) async fn tag_object_impl(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        tag_id: Uuid,
    ) -> AppResult<bool> {
        self.ensure_tag_in_org(org_id, tag_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO object_tags (object_id, tag_id)
            SELECT o.id, t.id
            FROM objects o
            JOIN tags t ON t.org_id = o.org_id AND t.id = $3
            WHERE o.id = $1 AND o.org_id = $2 AND o.deleted_at IS NULL
            ON CONFLICT (object_id, tag_id) DO NOTHING
            "#,
        )
        .bind(object_id)
        .bind(org_id.as_uuid())
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to tag object '{object_id}' with '{tag_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn place_on_funnel_step_impl(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        placement: &FunnelPlacement,
        actor_id: Uuid,
    ) -> AppResult<bool> {
        let funnel_id = placement.funnel_id();
        let step_id = self.resolve_step(org_id, placement).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO object_steps (id, object_id, funnel_id, step_id, creator_id)
            SELECT $1, o.id, $2, $3, $4
            FROM objects o
            WHERE o.id = $5 AND o.org_id = $6 AND o.deleted_at IS NULL
            ON CONFLICT (object_id, funnel_id) WHERE deleted_at IS NULL DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(funnel_id)
        .bind(step_id)
        .bind(actor_id)
        .bind(object_id)
        .bind(org_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to place object '{object_id}' on funnel '{funnel_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn ensure_tag_in_org(&self, org_id: OrgId, tag_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM tags WHERE id = $1 AND org_id = $2)",
        )
        .bind(tag_id)
        .bind(org_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to look up tag '{tag_id}': {error}")))?;

        if !exists {
            return Err(AppError::Store(format!(
                "tag '{tag_id}' not found in organization '{org_id}'"
            )));
        }

        Ok(())
    }

    /// Returns the configured step, or the funnel's lowest-order live step.
    async fn resolve_step(&self, org_id: OrgId, placement: &FunnelPlacement) -> AppResult<Uuid> {
        let funnel_id = placement.funnel_id();
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT s.id
            FROM funnel_steps s
            JOIN funnels f ON f.id = s.funnel_id
            WHERE f.id = $1
              AND f.org_id = $2
              AND f.deleted_at IS NULL
              AND s.deleted_at IS NULL
              AND ($3::uuid IS NULL OR s.id = $3)
            ORDER BY s.step_order ASC, s.id
            LIMIT 1
            "#,
        )
        .bind(funnel_id)
        .bind(org_id.as_uuid())
        .bind(placement.step_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!(
                "failed to resolve step for funnel '{funnel_id}': {error}"
            ))
        })?
        .ok_or_else(|| match placement.step_id() {
            Some(step_id) => AppError::Store(format!(
                "step '{step_id}' does not belong to funnel '{funnel_id}'"
            )),
            None => AppError::Store(format!("funnel '{funnel_id}' has no steps")),
        })
    }
}
