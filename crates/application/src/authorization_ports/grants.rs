use async_trait::async_trait;
use caregrid_core::{AppResult, OrgScope, RoleId, UserId};
use caregrid_domain::{PermissionOverride, ResourceAccessGrant, RoleAssignment, RoleGraph};
use chrono::{DateTime, Utc};

/// Repository port for pure, uncached grant reads.
///
/// Every accessor filters by the active flag and the half-open validity
/// window at `now`, and by scope where one is supplied. A scope mismatch
/// filters rows; it is never an error.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Lists role assignments effective at `now` under the scope.
    async fn active_role_assignments(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        scope: Option<OrgScope>,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Lists grant overrides effective at `now`.
    async fn active_direct_grants(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionOverride>>;

    /// Lists revoke overrides effective at `now`.
    async fn active_direct_revokes(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionOverride>>;

    /// Lists per-resource ACL entries for the user.
    async fn resource_access(&self, user_id: UserId) -> AppResult<Vec<ResourceAccessGrant>>;
}

/// Repository port for loading role inheritance closures.
#[async_trait]
pub trait RoleGraphRepository: Send + Sync {
    /// Loads every role reachable from `role_ids` through inheritance.
    ///
    /// The returned graph must be closed: expansion never goes back to the
    /// store.
    async fn load_role_graph(&self, role_ids: &[RoleId]) -> AppResult<RoleGraph>;
}
