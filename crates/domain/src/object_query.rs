use corvid_core::OrgId;
use uuid::Uuid;

use crate::AttributePredicate;

/// Compiled object predicate handed to the object store.
///
/// The store returns ids of live objects owned by `org_id` that satisfy every
/// clause. A query without clauses matches every live object of the org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectQuery {
    org_id: OrgId,
    clauses: Vec<ObjectPredicate>,
}

/// One conjunctive clause of an [`ObjectQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectPredicate {
    /// Full-text match delegated to the store's search capability.
    TextSearch(String),
    /// Object holds at least one of the tags.
    HasAnyTag(Vec<Uuid>),
    /// Object has attribute values for at least one of the types.
    HasAnyType(Vec<Uuid>),
    /// At least one predicate is satisfied by one of the object's attribute records.
    AttributeMatchAny(Vec<AttributePredicate>),
    /// Object occupies one of the steps; when sub-statuses are given, every
    /// listed step it occupies carries one of them.
    OnFunnelSteps {
        /// Candidate steps.
        step_ids: Vec<Uuid>,
        /// Accepted sub-statuses.
        sub_statuses: Option<Vec<i32>>,
    },
}

impl ObjectQuery {
    /// Creates an unconstrained query for one organization.
    #[must_use]
    pub fn for_org(org_id: OrgId) -> Self {
        Self {
            org_id,
            clauses: Vec::new(),
        }
    }

    /// Adds one conjunctive clause.
    #[must_use]
    pub fn with_clause(mut self, clause: ObjectPredicate) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Returns the owning organization.
    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    /// Returns the conjunctive clauses.
    #[must_use]
    pub fn clauses(&self) -> &[ObjectPredicate] {
        &self.clauses
    }
}

impl ObjectPredicate {
    /// Returns a stable clause label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextSearch(_) => "text_search",
            Self::HasAnyTag(_) => "has_any_tag",
            Self::HasAnyType(_) => "has_any_type",
            Self::AttributeMatchAny(_) => "attribute_match_any",
            Self::OnFunnelSteps { .. } => "on_funnel_steps",
        }
    }
}
