use corvid_domain::{AttributePredicate, ObjectPredicate};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use super::*;
use crate::like_pattern;

impl PostgresObjectStore {
    pub(super) async fn objects_matching_impl(&self, query: &ObjectQuery) -> AppResult<Vec<Uuid>> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT o.id FROM objects o WHERE o.org_id = ");
        builder.push_bind(query.org_id().as_uuid());
        builder.push(" AND o.deleted_at IS NULL");

        for clause in query.clauses() {
            builder.push(" AND ");
            push_clause(&mut builder, clause);
        }

        builder.push(" ORDER BY o.id");

        debug!(
            org_id = %query.org_id(),
            clauses = ?query.clauses().iter().map(ObjectPredicate::kind).collect::<Vec<_>>(),
            "querying objects"
        );

        builder
            .build_query_scalar::<Uuid>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Store(format!(
                    "failed to query objects for organization '{}': {error}",
                    query.org_id()
                ))
            })
    }
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, clause: &ObjectPredicate) {
    match clause {
        ObjectPredicate::TextSearch(search) => {
            builder.push(
                "concat_ws(' ', o.name, o.description, o.id_string, array_to_string(o.aliases, ' ')) ILIKE ",
            );
            builder.push_bind(like_pattern(search));
        }
        ObjectPredicate::HasAnyTag(tag_ids) => {
            builder.push(
                "EXISTS (SELECT 1 FROM object_tags ot WHERE ot.object_id = o.id AND ot.tag_id = ANY(",
            );
            builder.push_bind(tag_ids.clone());
            builder.push("))");
        }
        ObjectPredicate::HasAnyType(type_ids) => {
            builder.push(
                "EXISTS (SELECT 1 FROM object_type_values otv WHERE otv.object_id = o.id AND otv.type_id = ANY(",
            );
            builder.push_bind(type_ids.clone());
            builder.push("))");
        }
        ObjectPredicate::AttributeMatchAny(predicates) => {
            builder.push(
                "EXISTS (SELECT 1 FROM object_type_values otv WHERE otv.object_id = o.id AND (",
            );
            for (index, predicate) in predicates.iter().enumerate() {
                if index > 0 {
                    builder.push(" OR ");
                }
                push_attribute_predicate(builder, predicate);
            }
            builder.push("))");
        }
        ObjectPredicate::OnFunnelSteps {
            step_ids,
            sub_statuses,
        } => {
            builder.push(
                "EXISTS (SELECT 1 FROM object_steps os WHERE os.object_id = o.id AND os.deleted_at IS NULL AND os.step_id = ANY(",
            );
            builder.push_bind(step_ids.clone());
            builder.push("))");

            if let Some(sub_statuses) = sub_statuses {
                builder.push(
                    " AND NOT EXISTS (SELECT 1 FROM object_steps os WHERE os.object_id = o.id AND os.deleted_at IS NULL AND os.step_id = ANY(",
                );
                builder.push_bind(step_ids.clone());
                builder.push(") AND NOT (os.sub_status = ANY(");
                builder.push_bind(sub_statuses.clone());
                builder.push(")))");
            }
        }
    }
}

fn push_attribute_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &AttributePredicate) {
    builder.push('(');
    for (index, (key, value)) in predicate.pairs().iter().enumerate() {
        if index > 0 {
            builder.push(" AND ");
        }
        builder.push("otv.type_values ->> ");
        builder.push_bind(key.clone());
        builder.push(" ILIKE ");
        builder.push_bind(like_pattern(value));
    }
    builder.push(')');
}
