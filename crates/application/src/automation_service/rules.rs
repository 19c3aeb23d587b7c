use super::*;

impl AutomationService {
    /// Creates one rule owned by the actor's organization.
    pub async fn create_rule(
        &self,
        actor: &UserIdentity,
        input: SaveAutomationRuleInput,
    ) -> AppResult<AutomationRule> {
        let input = validated_save_input(input)?;
        let rule = self
            .rule_repository
            .create_rule(create_input(actor, input))
            .await?;

        log_rule_saved("created", actor, &rule);
        Ok(rule)
    }

    /// Lists rules of the actor's organization with their latest execution.
    pub async fn list_rules(
        &self,
        actor: &UserIdentity,
        query: AutomationRuleListQuery,
    ) -> AppResult<AutomationRulePage> {
        let query = list_query(query)?;
        let rules = self
            .rule_repository
            .list_rules(actor.org_id(), &query)
            .await?;
        let total_count = self
            .rule_repository
            .count_rules(actor.org_id(), query.search.as_deref())
            .await?;

        let mut entries = Vec::with_capacity(rules.len());
        for rule in rules {
            let last_execution = self.execution_repository.latest_execution(rule.id()).await?;
            entries.push(AutomationRuleSummary {
                rule,
                last_execution,
            });
        }

        Ok(AutomationRulePage {
            entries,
            total_count,
        })
    }

    /// Returns one rule of the actor's organization.
    pub async fn find_rule(&self, actor: &UserIdentity, rule_id: Uuid) -> AppResult<AutomationRule> {
        self.require_rule(actor, rule_id).await
    }

    /// Replaces the definition of one rule.
    pub async fn update_rule(
        &self,
        actor: &UserIdentity,
        rule_id: Uuid,
        input: SaveAutomationRuleInput,
    ) -> AppResult<AutomationRule> {
        let input = validated_save_input(input)?;
        let rule = self
            .rule_repository
            .update_rule(actor.org_id(), update_input(rule_id, input))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("automation rule '{rule_id}' not found")))?;

        log_rule_saved("updated", actor, &rule);
        Ok(rule)
    }

    /// Soft-deletes one rule so the scheduler never selects it again.
    pub async fn delete_rule(&self, actor: &UserIdentity, rule_id: Uuid) -> AppResult<()> {
        let deleted = self
            .rule_repository
            .soft_delete_rule(actor.org_id(), rule_id, self.clock.now())
            .await?;
        if !deleted {
            return Err(AppError::NotFound(format!(
                "automation rule '{rule_id}' not found"
            )));
        }

        info!(%rule_id, org_id = %actor.org_id(), user_id = %actor.user_id(), "automation rule deleted");
        Ok(())
    }
}
