use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use caregrid_application::{
    AssignRoleInput, GrantMutationRepository, GrantRepository, PermissionOverrideInput,
    RoleGraphRepository,
};
use caregrid_core::{AppError, AppResult, OrgScope, RoleId, UserId};
use caregrid_domain::{
    OverrideAction, PermissionOverride, ResourceAccessGrant, RoleAssignment, RoleGraph,
};

mod assignments;
mod mutations;
mod overrides;
mod resource_access;
mod roles;

/// PostgreSQL-backed repository for grant reads, role graphs and writes.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_id: Uuid,
    role_id: Uuid,
    organization_id: Option<Uuid>,
    department_id: Option<Uuid>,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct OverrideRow {
    user_id: Uuid,
    permission: String,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    granted_by: Uuid,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct ResourceAccessRow {
    user_id: Uuid,
    resource_type: String,
    resource_id: String,
    access_level: String,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    organization_id: Option<Uuid>,
    is_system: bool,
}

#[derive(Debug, FromRow)]
struct InheritanceRow {
    role_id: Uuid,
    parent_role_id: Uuid,
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: Uuid,
    permission: String,
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn active_role_assignments(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        scope: Option<OrgScope>,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.active_role_assignments_impl(user_id, now, scope).await
    }

    async fn active_direct_grants(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionOverride>> {
        self.active_overrides_impl(user_id, now, OverrideAction::Grant)
            .await
    }

    async fn active_direct_revokes(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionOverride>> {
        self.active_overrides_impl(user_id, now, OverrideAction::Revoke)
            .await
    }

    async fn resource_access(&self, user_id: UserId) -> AppResult<Vec<ResourceAccessGrant>> {
        self.resource_access_impl(user_id).await
    }
}

#[async_trait]
impl RoleGraphRepository for PostgresGrantRepository {
    async fn load_role_graph(&self, role_ids: &[RoleId]) -> AppResult<RoleGraph> {
        self.load_role_graph_impl(role_ids).await
    }
}

#[async_trait]
impl GrantMutationRepository for PostgresGrantRepository {
    async fn insert_role_assignment(&self, input: AssignRoleInput) -> AppResult<()> {
        self.insert_role_assignment_impl(input).await
    }

    async fn insert_permission_override(
        &self,
        action: OverrideAction,
        input: PermissionOverrideInput,
    ) -> AppResult<()> {
        self.insert_permission_override_impl(action, input).await
    }
}
