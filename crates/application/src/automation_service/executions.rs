use super::*;

impl AutomationService {
    /// Lists executions of one rule, newest first.
    pub async fn list_executions(
        &self,
        actor: &UserIdentity,
        rule_id: Uuid,
        query: ExecutionListQuery,
    ) -> AppResult<ExecutionPage> {
        let query = execution_query(query)?;
        let rule = self.require_rule(actor, rule_id).await?;

        let entries = self
            .execution_repository
            .list_executions(rule.id(), query)
            .await?;
        let total_count = self.execution_repository.count_executions(rule.id()).await?;

        Ok(ExecutionPage {
            entries,
            total_count,
        })
    }
}
