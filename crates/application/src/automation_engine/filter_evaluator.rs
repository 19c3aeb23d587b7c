use std::collections::BTreeSet;
use std::sync::Arc;

use corvid_core::{AppResult, OrgId};
use corvid_domain::{FilterConfig, ObjectPredicate, ObjectQuery};
use tracing::debug;
use uuid::Uuid;

use crate::automation_ports::ObjectStore;

/// Resolves a rule filter into the set of matching object ids.
#[derive(Clone)]
pub struct FilterEvaluator {
    store: Arc<dyn ObjectStore>,
}

impl FilterEvaluator {
    /// Creates an evaluator over an object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Compiles the present filter dimensions into one conjunctive store query.
    #[must_use]
    pub fn compile(org_id: OrgId, filter: &FilterConfig) -> ObjectQuery {
        let mut query = ObjectQuery::for_org(org_id);

        if let Some(search) = filter.search() {
            query = query.with_clause(ObjectPredicate::TextSearch(search.to_owned()));
        }

        if !filter.tag_ids().is_empty() {
            query = query.with_clause(ObjectPredicate::HasAnyTag(filter.tag_ids().to_vec()));
        }

        if !filter.type_ids().is_empty() {
            query = query.with_clause(ObjectPredicate::HasAnyType(filter.type_ids().to_vec()));
        }

        if !filter.attribute_predicates().is_empty() {
            query = query.with_clause(ObjectPredicate::AttributeMatchAny(
                filter.attribute_predicates().to_vec(),
            ));
        }

        if let Some(funnel_step_filter) = filter.funnel_step_filter() {
            query = query.with_clause(ObjectPredicate::OnFunnelSteps {
                step_ids: funnel_step_filter.step_ids().to_vec(),
                sub_statuses: funnel_step_filter.sub_statuses().map(<[i32]>::to_vec),
            });
        }

        query
    }

    /// Returns ids of live objects of `org_id` matching every present dimension.
    pub async fn evaluate(&self, org_id: OrgId, filter: &FilterConfig) -> AppResult<BTreeSet<Uuid>> {
        let query = Self::compile(org_id, filter);
        let matched: BTreeSet<Uuid> = self
            .store
            .objects_matching(&query)
            .await?
            .into_iter()
            .collect();

        debug!(
            %org_id,
            clauses = query.clauses().len(),
            unconstrained = filter.is_unconstrained(),
            matched = matched.len(),
            "evaluated automation filter"
        );

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use corvid_core::OrgId;
    use corvid_domain::{FilterConfig, ObjectPredicate};
    use serde_json::json;
    use uuid::Uuid;

    use super::FilterEvaluator;

    #[test]
    fn empty_filter_compiles_to_unconstrained_query() {
        let org_id = OrgId::new();
        let filter = FilterConfig::from_document(&json!({})).unwrap_or_else(|_| unreachable!());

        let query = FilterEvaluator::compile(org_id, &filter);

        assert_eq!(query.org_id(), org_id);
        assert!(query.clauses().is_empty());
    }

    #[test]
    fn every_present_dimension_becomes_one_clause() {
        let tag_id = Uuid::new_v4();
        let type_id = Uuid::new_v4();
        let step_id = Uuid::new_v4();
        let filter = FilterConfig::from_document(&json!({
            "search": "acme",
            "tag_ids": [tag_id],
            "type_ids": [type_id],
            "type_value_criteria": [{"industry": "retail"}],
            "funnel_step_filter": {"step_ids": [step_id], "sub_statuses": [1, 2]}
        }))
        .unwrap_or_else(|_| unreachable!());

        let query = FilterEvaluator::compile(OrgId::new(), &filter);
        let kinds: Vec<&str> = query.clauses().iter().map(ObjectPredicate::kind).collect();

        assert_eq!(
            kinds,
            vec![
                "text_search",
                "has_any_tag",
                "has_any_type",
                "attribute_match_any",
                "on_funnel_steps"
            ]
        );
        assert!(query.clauses().contains(&ObjectPredicate::OnFunnelSteps {
            step_ids: vec![step_id],
            sub_statuses: Some(vec![1, 2]),
        }));
    }
}
