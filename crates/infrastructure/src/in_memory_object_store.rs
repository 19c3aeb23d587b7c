use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use corvid_application::ObjectStore;
use corvid_core::{AppError, AppResult, OrgId};
use corvid_domain::{FunnelPlacement, ObjectPredicate, ObjectQuery};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Descriptive fields of one seeded object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSeed {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// External identifier string.
    pub id_string: String,
    /// Alternate names.
    pub aliases: Vec<String>,
}

impl ObjectSeed {
    /// Creates a seed carrying only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlacement {
    step_id: Uuid,
    sub_status: i32,
}

#[derive(Debug)]
struct StoredObject {
    org_id: OrgId,
    searchable_text: String,
    deleted: bool,
    tags: BTreeSet<Uuid>,
    type_values: Vec<(Uuid, BTreeMap<String, String>)>,
    placements: HashMap<Uuid, StepPlacement>,
}

#[derive(Debug)]
struct StoredFunnel {
    org_id: OrgId,
    steps: Vec<(i32, Uuid)>,
}

#[derive(Debug, Default)]
struct ObjectStoreState {
    objects: HashMap<Uuid, StoredObject>,
    tags: HashMap<Uuid, OrgId>,
    funnels: HashMap<Uuid, StoredFunnel>,
}

/// In-memory object store with seeding helpers for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    state: RwLock<ObjectStoreState>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one live object and returns its id.
    pub async fn insert_object(&self, org_id: OrgId, seed: ObjectSeed) -> Uuid {
        let object_id = Uuid::new_v4();
        let searchable_text = [
            seed.name,
            seed.description,
            seed.id_string,
            seed.aliases.join(" "),
        ]
        .join(" ")
        .to_lowercase();

        self.state.write().await.objects.insert(
            object_id,
            StoredObject {
                org_id,
                searchable_text,
                deleted: false,
                tags: BTreeSet::new(),
                type_values: Vec::new(),
                placements: HashMap::new(),
            },
        );
        object_id
    }

    /// Adds one tag owned by `org_id` and returns its id.
    pub async fn insert_tag(&self, org_id: OrgId) -> Uuid {
        let tag_id = Uuid::new_v4();
        self.state.write().await.tags.insert(tag_id, org_id);
        tag_id
    }

    /// Adds one funnel with steps in the given order and returns the funnel
    /// id with its step ids in the same order.
    pub async fn insert_funnel(&self, org_id: OrgId, step_orders: &[i32]) -> (Uuid, Vec<Uuid>) {
        let funnel_id = Uuid::new_v4();
        let steps: Vec<(i32, Uuid)> = step_orders
            .iter()
            .map(|order| (*order, Uuid::new_v4()))
            .collect();
        let step_ids = steps.iter().map(|(_, step_id)| *step_id).collect();

        self.state
            .write()
            .await
            .funnels
            .insert(funnel_id, StoredFunnel { org_id, steps });
        (funnel_id, step_ids)
    }

    /// Attaches one attribute record of `type_id` to an object.
    pub async fn add_type_values(
        &self,
        object_id: Uuid,
        type_id: Uuid,
        values: BTreeMap<String, String>,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let object = object_mut(&mut state, object_id)?;
        object.type_values.push((type_id, values));
        Ok(())
    }

    /// Sets the sub-status of an object's live placement on a funnel.
    pub async fn set_sub_status(
        &self,
        object_id: Uuid,
        funnel_id: Uuid,
        sub_status: i32,
    ) -> AppResult<()> {
        let mut state = self.state.write().await;
        let placement = object_mut(&mut state, object_id)?
            .placements
            .get_mut(&funnel_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "object '{object_id}' is not placed on funnel '{funnel_id}'"
                ))
            })?;
        placement.sub_status = sub_status;
        Ok(())
    }

    /// Soft-deletes an object.
    pub async fn delete_object(&self, object_id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        object_mut(&mut state, object_id)?.deleted = true;
        Ok(())
    }

    /// Returns the tags held by an object.
    pub async fn tags_of(&self, object_id: Uuid) -> BTreeSet<Uuid> {
        self.state
            .read()
            .await
            .objects
            .get(&object_id)
            .map(|object| object.tags.clone())
            .unwrap_or_default()
    }

    /// Returns the step an object occupies on a funnel.
    pub async fn step_of(&self, object_id: Uuid, funnel_id: Uuid) -> Option<Uuid> {
        self.state
            .read()
            .await
            .objects
            .get(&object_id)
            .and_then(|object| object.placements.get(&funnel_id))
            .map(|placement| placement.step_id)
    }
}

fn object_mut(state: &mut ObjectStoreState, object_id: Uuid) -> AppResult<&mut StoredObject> {
    state
        .objects
        .get_mut(&object_id)
        .ok_or_else(|| AppError::NotFound(format!("object '{object_id}' not found")))
}

fn satisfies(object: &StoredObject, clause: &ObjectPredicate) -> bool {
    match clause {
        ObjectPredicate::TextSearch(search) => object
            .searchable_text
            .contains(search.to_lowercase().as_str()),
        ObjectPredicate::HasAnyTag(tag_ids) => {
            tag_ids.iter().any(|tag_id| object.tags.contains(tag_id))
        }
        ObjectPredicate::HasAnyType(type_ids) => object
            .type_values
            .iter()
            .any(|(type_id, _)| type_ids.contains(type_id)),
        ObjectPredicate::AttributeMatchAny(predicates) => {
            object.type_values.iter().any(|(_, record)| {
                predicates
                    .iter()
                    .any(|predicate| predicate.matches(record))
            })
        }
        ObjectPredicate::OnFunnelSteps {
            step_ids,
            sub_statuses,
        } => {
            let mut occupied = object
                .placements
                .values()
                .filter(|placement| step_ids.contains(&placement.step_id))
                .peekable();
            if occupied.peek().is_none() {
                return false;
            }

            match sub_statuses {
                Some(accepted) => {
                    occupied.all(|placement| accepted.contains(&placement.sub_status))
                }
                None => true,
            }
        }
    }
}

fn resolve_step(
    state: &ObjectStoreState,
    org_id: OrgId,
    placement: &FunnelPlacement,
) -> AppResult<Uuid> {
    let funnel_id = placement.funnel_id();
    let steps = state
        .funnels
        .get(&funnel_id)
        .filter(|funnel| funnel.org_id == org_id)
        .map(|funnel| funnel.steps.as_slice())
        .unwrap_or_default();

    match placement.step_id() {
        Some(step_id) => steps
            .iter()
            .any(|(_, candidate)| *candidate == step_id)
            .then_some(step_id)
            .ok_or_else(|| {
                AppError::Store(format!(
                    "step '{step_id}' does not belong to funnel '{funnel_id}'"
                ))
            }),
        None => steps
            .iter()
            .min()
            .map(|(_, step_id)| *step_id)
            .ok_or_else(|| AppError::Store(format!("funnel '{funnel_id}' has no steps"))),
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn objects_matching(&self, query: &ObjectQuery) -> AppResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut matched: Vec<Uuid> = state
            .objects
            .iter()
            .filter(|(_, object)| object.org_id == query.org_id() && !object.deleted)
            .filter(|(_, object)| {
                query
                    .clauses()
                    .iter()
                    .all(|clause| satisfies(object, clause))
            })
            .map(|(object_id, _)| *object_id)
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn tag_object(&self, org_id: OrgId, object_id: Uuid, tag_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.tags.get(&tag_id) != Some(&org_id) {
            return Err(AppError::Store(format!(
                "tag '{tag_id}' not found in organization '{org_id}'"
            )));
        }

        match state.objects.get_mut(&object_id) {
            Some(object) if object.org_id == org_id && !object.deleted => {
                Ok(object.tags.insert(tag_id))
            }
            _ => Ok(false),
        }
    }

    async fn place_on_funnel_step(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        placement: &FunnelPlacement,
        _actor_id: Uuid,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let step_id = resolve_step(&state, org_id, placement)?;

        match state.objects.get_mut(&object_id) {
            Some(object) if object.org_id == org_id && !object.deleted => {
                if object.placements.contains_key(&placement.funnel_id()) {
                    return Ok(false);
                }
                object.placements.insert(
                    placement.funnel_id(),
                    StepPlacement {
                        step_id,
                        sub_status: 0,
                    },
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests;
