use async_trait::async_trait;
use corvid_core::AppResult;

/// One held scheduler lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Distributed coordination port so only one scheduler instance runs a tick.
#[async_trait]
pub trait SchedulerLeaseCoordinator: Send + Sync {
    /// Attempts to acquire one lease for the given scope.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SchedulerLease>>;

    /// Releases one lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &SchedulerLease) -> AppResult<()>;
}
