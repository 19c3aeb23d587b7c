use std::collections::BTreeMap;

use corvid_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Maximum number of attribute predicates one filter may carry.
pub const MAX_ATTRIBUTE_PREDICATES: usize = 3;

/// Decoded rule filter.
///
/// Every present dimension must hold for an object to match. Empty lists and an
/// empty search string are treated as absent dimensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    search: Option<String>,
    tag_ids: Vec<Uuid>,
    type_ids: Vec<Uuid>,
    attribute_predicates: Vec<AttributePredicate>,
    funnel_step_filter: Option<FunnelStepFilter>,
}

/// Key to substring conditions that one attribute record must satisfy together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePredicate {
    pairs: BTreeMap<String, String>,
}

/// Funnel step membership condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunnelStepFilter {
    step_ids: Vec<Uuid>,
    sub_statuses: Option<Vec<i32>>,
}

impl FilterConfig {
    /// Decodes one stored filter document.
    pub fn from_document(document: &Value) -> AppResult<Self> {
        let document: FilterConfigDocument = serde_json::from_value(document.clone())
            .map_err(|error| AppError::Config(format!("invalid filter_config: {error}")))?;

        document.try_into()
    }

    /// Returns the text search query, if any.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Returns tag ids of which an object must hold at least one.
    #[must_use]
    pub fn tag_ids(&self) -> &[Uuid] {
        &self.tag_ids
    }

    /// Returns object type ids of which an object must have at least one.
    #[must_use]
    pub fn type_ids(&self) -> &[Uuid] {
        &self.type_ids
    }

    /// Returns attribute predicates; a match on any one of them counts.
    #[must_use]
    pub fn attribute_predicates(&self) -> &[AttributePredicate] {
        &self.attribute_predicates
    }

    /// Returns the funnel step condition, if any.
    #[must_use]
    pub fn funnel_step_filter(&self) -> Option<&FunnelStepFilter> {
        self.funnel_step_filter.as_ref()
    }

    /// Returns true when no dimension constrains the match.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.search.is_none()
            && self.tag_ids.is_empty()
            && self.type_ids.is_empty()
            && self.attribute_predicates.is_empty()
            && self.funnel_step_filter.is_none()
    }
}

impl AttributePredicate {
    /// Creates a predicate from key/substring pairs.
    pub fn new(pairs: BTreeMap<String, String>) -> AppResult<Self> {
        if pairs.is_empty() {
            return Err(AppError::Config(
                "attribute predicate requires at least one key".to_owned(),
            ));
        }

        if pairs.keys().any(|key| key.trim().is_empty()) {
            return Err(AppError::Config(
                "attribute predicate keys must not be empty".to_owned(),
            ));
        }

        Ok(Self { pairs })
    }

    /// Returns key/substring pairs.
    #[must_use]
    pub fn pairs(&self) -> &BTreeMap<String, String> {
        &self.pairs
    }

    /// Returns true when one attribute record holds every key with a value
    /// containing the expected substring, ignoring case.
    #[must_use]
    pub fn matches(&self, record: &BTreeMap<String, String>) -> bool {
        self.pairs.iter().all(|(key, expected)| {
            record.get(key).is_some_and(|actual| {
                actual
                    .to_lowercase()
                    .contains(expected.to_lowercase().as_str())
            })
        })
    }
}

impl FunnelStepFilter {
    /// Returns candidate step ids.
    #[must_use]
    pub fn step_ids(&self) -> &[Uuid] {
        &self.step_ids
    }

    /// Returns accepted sub-statuses, if restricted.
    #[must_use]
    pub fn sub_statuses(&self) -> Option<&[i32]> {
        self.sub_statuses.as_deref()
    }
}

#[derive(Debug, Default, Deserialize)]
struct FilterConfigDocument {
    #[serde(default)]
    search: Option<String>,
    #[serde(default, alias = "tagIds")]
    tag_ids: Option<Vec<Uuid>>,
    #[serde(default, alias = "typeIds")]
    type_ids: Option<Vec<Uuid>>,
    #[serde(default, alias = "typeValueCriteria")]
    type_value_criteria: Option<TypeValueCriteriaDocument>,
    #[serde(default, alias = "funnelStepFilter")]
    funnel_step_filter: Option<FunnelStepFilterDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeValueCriteriaDocument {
    List(Vec<CriterionDocument>),
    Numbered(NumberedCriteriaDocument),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumberedCriteriaDocument {
    #[serde(default)]
    criteria1: Option<CriterionDocument>,
    #[serde(default)]
    criteria2: Option<CriterionDocument>,
    #[serde(default)]
    criteria3: Option<CriterionDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CriterionDocument {
    FieldValue(FieldValueCriterion),
    Pairs(BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldValueCriterion {
    field: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FunnelStepFilterDocument {
    #[serde(default, alias = "stepIds")]
    step_ids: Option<Vec<Uuid>>,
    #[serde(default, alias = "subStatuses")]
    sub_statuses: Option<Vec<i32>>,
}

impl TryFrom<FilterConfigDocument> for FilterConfig {
    type Error = AppError;

    fn try_from(document: FilterConfigDocument) -> AppResult<Self> {
        let search = document
            .search
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let criteria = match document.type_value_criteria {
            None => Vec::new(),
            Some(TypeValueCriteriaDocument::List(items)) => items,
            Some(TypeValueCriteriaDocument::Numbered(numbered)) => {
                [numbered.criteria1, numbered.criteria2, numbered.criteria3]
                    .into_iter()
                    .flatten()
                    .collect()
            }
        };

        let attribute_predicates = criteria
            .into_iter()
            .filter_map(CriterionDocument::into_pairs)
            .map(AttributePredicate::new)
            .collect::<AppResult<Vec<_>>>()?;

        if attribute_predicates.len() > MAX_ATTRIBUTE_PREDICATES {
            return Err(AppError::Config(format!(
                "filter_config supports at most {MAX_ATTRIBUTE_PREDICATES} type value criteria, got {}",
                attribute_predicates.len()
            )));
        }

        let funnel_step_filter = document.funnel_step_filter.and_then(|filter| {
            let step_ids = dedup(filter.step_ids.unwrap_or_default());
            if step_ids.is_empty() {
                return None;
            }

            let sub_statuses = filter.sub_statuses.filter(|statuses| !statuses.is_empty());
            Some(FunnelStepFilter {
                step_ids,
                sub_statuses,
            })
        });

        Ok(Self {
            search,
            tag_ids: dedup(document.tag_ids.unwrap_or_default()),
            type_ids: dedup(document.type_ids.unwrap_or_default()),
            attribute_predicates,
            funnel_step_filter,
        })
    }
}

impl CriterionDocument {
    fn into_pairs(self) -> Option<BTreeMap<String, String>> {
        let pairs = match self {
            Self::FieldValue(criterion) => BTreeMap::from([(criterion.field, criterion.value)]),
            Self::Pairs(pairs) => pairs,
        };

        (!pairs.is_empty()).then_some(pairs)
    }
}

fn dedup(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
