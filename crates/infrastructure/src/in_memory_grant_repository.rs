//! In-memory grant store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use caregrid_application::{
    AssignRoleInput, GrantMutationRepository, GrantRepository, PermissionOverrideInput,
    RoleGraphRepository,
};
use caregrid_core::{AppResult, OrgScope, RoleId, UserId};
use caregrid_domain::{
    OverrideAction, PermissionOverride, ResourceAccessGrant, RoleAssignment, RoleGraph,
    RoleGraphNode,
};

#[derive(Default)]
struct GrantState {
    graph: RoleGraph,
    assignments: Vec<RoleAssignment>,
    overrides: Vec<PermissionOverride>,
    resource_access: Vec<ResourceAccessGrant>,
}

/// In-memory adapter covering the grant read, role graph and mutation ports.
#[derive(Default)]
pub struct InMemoryGrantRepository {
    state: RwLock<GrantState>,
}

impl InMemoryGrantRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a role node in the inheritance graph.
    pub async fn insert_role(&self, node: RoleGraphNode) {
        self.state.write().await.graph.insert(node);
    }

    /// Seeds a per-resource ACL entry.
    pub async fn insert_resource_access(&self, grant: ResourceAccessGrant) {
        self.state.write().await.resource_access.push(grant);
    }

    /// Seeds a raw override row, windows and all.
    pub async fn insert_override(&self, entry: PermissionOverride) {
        self.state.write().await.overrides.push(entry);
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrantRepository {
    async fn active_role_assignments(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        scope: Option<OrgScope>,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.user_id == user_id
                    && assignment.is_effective_at(now)
                    && assignment.matches_scope(scope.as_ref())
            })
            .cloned()
            .collect())
    }

    async fn active_direct_grants(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionOverride>> {
        self.active_overrides(user_id, now, OverrideAction::Grant)
            .await
    }

    async fn active_direct_revokes(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionOverride>> {
        self.active_overrides(user_id, now, OverrideAction::Revoke)
            .await
    }

    async fn resource_access(&self, user_id: UserId) -> AppResult<Vec<ResourceAccessGrant>> {
        Ok(self
            .state
            .read()
            .await
            .resource_access
            .iter()
            .filter(|grant| grant.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl InMemoryGrantRepository {
    async fn active_overrides(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        action: OverrideAction,
    ) -> AppResult<Vec<PermissionOverride>> {
        Ok(self
            .state
            .read()
            .await
            .overrides
            .iter()
            .filter(|entry| {
                entry.user_id == user_id && entry.action == action && entry.is_effective_at(now)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleGraphRepository for InMemoryGrantRepository {
    async fn load_role_graph(&self, _role_ids: &[RoleId]) -> AppResult<RoleGraph> {
        Ok(self.state.read().await.graph.clone())
    }
}

#[async_trait]
impl GrantMutationRepository for InMemoryGrantRepository {
    async fn insert_role_assignment(&self, input: AssignRoleInput) -> AppResult<()> {
        self.state.write().await.assignments.push(RoleAssignment {
            user_id: input.user_id,
            role_id: input.role_id,
            organization_id: input.organization_id,
            department_id: input.department_id,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            is_active: true,
        });
        Ok(())
    }

    async fn insert_permission_override(
        &self,
        action: OverrideAction,
        input: PermissionOverrideInput,
    ) -> AppResult<()> {
        self.state.write().await.overrides.push(PermissionOverride {
            user_id: input.user_id,
            permission_name: input.permission_name,
            action,
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            granted_by: input.granted_by,
            notes: input.notes,
        });
        Ok(())
    }
}
