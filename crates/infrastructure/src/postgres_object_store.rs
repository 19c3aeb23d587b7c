use async_trait::async_trait;
use corvid_application::ObjectStore;
use corvid_core::{AppError, AppResult, OrgId};
use corvid_domain::{FunnelPlacement, ObjectQuery};
use sqlx::PgPool;
use uuid::Uuid;

mod mutations;
mod query;

/// PostgreSQL-backed object store used by the automation engine.
#[derive(Clone)]
pub struct PostgresObjectStore {
    pool: PgPool,
}

impl PostgresObjectStore {
    /// Creates an object store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObjectStore for PostgresObjectStore {
    async fn objects_matching(&self, query: &ObjectQuery) -> AppResult<Vec<Uuid>> {
        self.objects_matching_impl(query).await
    }

    async fn tag_object(&self, org_id: OrgId, object_id: Uuid, tag_id: Uuid) -> AppResult<bool> {
        self.tag_object_impl(org_id, object_id, tag_id).await
    }

    async fn place_on_funnel_step(
        &self,
        org_id: OrgId,
        object_id: Uuid,
        placement: &FunnelPlacement,
        actor_id: Uuid,
    ) -> AppResult<bool> {
        self.place_on_funnel_step_impl(org_id, object_id, placement, actor_id)
            .await
    }
}
