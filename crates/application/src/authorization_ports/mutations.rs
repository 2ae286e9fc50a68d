use async_trait::async_trait;
use caregrid_core::{AppResult, DepartmentId, OrgId, RoleId, UserId};
use caregrid_domain::{OverrideAction, PermissionName};
use chrono::{DateTime, Utc};

/// Input payload for assigning a role to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// User receiving the role.
    pub user_id: UserId,
    /// Role to assign.
    pub role_id: RoleId,
    /// Organization the assignment applies in; `None` is globally scoped.
    pub organization_id: Option<OrgId>,
    /// Optional department restriction.
    pub department_id: Option<DepartmentId>,
    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,
    /// Exclusive end of the validity window, open-ended when `None`.
    pub valid_until: Option<DateTime<Utc>>,
}

/// Input payload for a direct permission override.
///
/// The grant-or-revoke direction is supplied separately by the facade
/// wrapper; the payload itself is direction-neutral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionOverrideInput {
    /// User the override targets.
    pub user_id: UserId,
    /// Permission the override targets.
    pub permission_name: PermissionName,
    /// Start of the validity window.
    pub valid_from: DateTime<Utc>,
    /// Exclusive end of the validity window, open-ended when `None`.
    pub valid_until: Option<DateTime<Utc>>,
    /// Administrator creating the override.
    pub granted_by: UserId,
    /// Free-form justification.
    pub notes: Option<String>,
}

/// Repository port for grant mutations.
///
/// Implementations must commit durably before returning so the facade can
/// order invalidation strictly after the write.
#[async_trait]
pub trait GrantMutationRepository: Send + Sync {
    /// Persists a role assignment.
    async fn insert_role_assignment(&self, input: AssignRoleInput) -> AppResult<()>;

    /// Persists a direct permission override with the given direction.
    async fn insert_permission_override(
        &self,
        action: OverrideAction,
        input: PermissionOverrideInput,
    ) -> AppResult<()>;
}
