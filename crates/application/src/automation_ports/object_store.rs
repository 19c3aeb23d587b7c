use async_trait::async_trait;
use corvid_core::{AppResult, OrgId};
use corvid_domain::{FunnelPlacement, ObjectQuery};
use uuid::Uuid;

/// Object store capabilities consumed by the automation engine.
///
/// Implementations report failures as `AppError::Store`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns ids of live objects of the query's organization matching every clause.
    async fn objects_matching(&self, query: &ObjectQuery) -> AppResult<Vec<Uuid>>;

    /// Attaches a tag unless the object already holds it. Returns whether a tag was attached.
    /// A tag that does not exist in `org_id` is a store error.
    async fn tag_object(&self, org_id: OrgId, object_id: Uuid, tag_id: Uuid) -> AppResult<bool>;

    /// Places an object on a funnel step unless it is already in the funnel.
    /// Returns whether the object was placed.
    async fn place_on_funnel_step(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        placement: &FunnelPlacement,
        actor_id: Uuid,
    ) -> AppResult<bool>;
}
