use std::sync::Arc;

use caregrid_core::{AppError, AppResult, UserId, UserIdentity};
use caregrid_domain::{
    AccessLevel, EffectivePermissionSnapshot, OverrideAction, PermissionCatalog, PermissionName,
};

use crate::authorization_ports::{
    AssignRoleInput, GrantMutationRepository, PermissionOverrideInput,
};
use crate::snapshot_cache::{CacheStats, SnapshotCache};

/// Facade and sole entry point of the authorization core.
///
/// Reads go through the snapshot cache; mutations go through the mutation
/// port and invalidate the affected user strictly after the write
/// committed. Decision paths never surface infrastructure errors: they log
/// and deny.
#[derive(Clone)]
pub struct AuthorizationService {
    catalog: Arc<PermissionCatalog>,
    cache: SnapshotCache,
    mutations: Arc<dyn GrantMutationRepository>,
}

impl AuthorizationService {
    /// Creates the facade from its injected collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<PermissionCatalog>,
        cache: SnapshotCache,
        mutations: Arc<dyn GrantMutationRepository>,
    ) -> Self {
        Self {
            catalog,
            cache,
            mutations,
        }
    }

    /// Returns whether the user currently holds a permission.
    ///
    /// Never errors for "not authorized". An infrastructure failure is
    /// logged with user, permission and error kind, then resolves to
    /// `false`: ambiguity always denies.
    ///
    /// When a concrete resource is supplied and the permission itself is
    /// not held, per-resource ACL entries are consulted as a fallback: the
    /// action suffix maps to a minimum access level which a matching entry
    /// must meet or exceed.
    pub async fn has_permission(
        &self,
        identity: &UserIdentity,
        permission: &PermissionName,
        resource: Option<(&str, &str)>,
    ) -> bool {
        let snapshot = match self
            .cache
            .snapshot(identity.user_id(), identity.org_scope())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::error!(
                    user_id = %identity.user_id(),
                    permission = %permission,
                    error_kind = error.kind(),
                    error = %error,
                    "permission check failed; denying"
                );
                return false;
            }
        };

        if snapshot.allows(permission) {
            return true;
        }
        if snapshot.revoked.contains(permission) {
            // an explicit revoke also locks the resource fallback channel
            return false;
        }

        let Some((resource_type, resource_id)) = resource else {
            return false;
        };
        let minimum = AccessLevel::required_for_action(permission.action());
        snapshot
            .resource_access
            .iter()
            .any(|grant| grant.covers(resource_type, resource_id, minimum))
    }

    /// Returns the effective permission snapshot for a user.
    ///
    /// Read-only; suitable for populating a signed token's claim set.
    pub async fn effective_permissions(
        &self,
        identity: &UserIdentity,
    ) -> AppResult<EffectivePermissionSnapshot> {
        self.cache
            .snapshot(identity.user_id(), identity.org_scope())
            .await
    }

    /// Drops cached state for one user after an external committed write.
    pub async fn invalidate(&self, user_id: UserId) -> AppResult<()> {
        self.cache.invalidate(user_id).await
    }

    /// Drops cached state for a batch of users.
    pub async fn invalidate_bulk(&self, user_ids: &[UserId]) -> AppResult<()> {
        self.cache.invalidate_bulk(user_ids).await
    }

    /// Assigns a role, then invalidates the user's cached snapshot.
    pub async fn assign_role(&self, input: AssignRoleInput) -> AppResult<()> {
        let user_id = input.user_id;
        self.mutations.insert_role_assignment(input).await?;
        self.cache.invalidate(user_id).await
    }

    /// Writes a grant override, then invalidates the user's snapshot.
    pub async fn grant_permission(&self, input: PermissionOverrideInput) -> AppResult<()> {
        self.write_override(OverrideAction::Grant, input).await
    }

    /// Writes a revoke override, then invalidates the user's snapshot.
    ///
    /// After this returns, no reader observes the revoked permission as
    /// granted, even if a positive snapshot existed moments before.
    pub async fn revoke_permission(&self, input: PermissionOverrideInput) -> AppResult<()> {
        self.write_override(OverrideAction::Revoke, input).await
    }

    /// Returns cache diagnostics for operational dashboards.
    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn write_override(
        &self,
        action: OverrideAction,
        input: PermissionOverrideInput,
    ) -> AppResult<()> {
        if self.catalog.get(&input.permission_name).is_none() {
            return Err(AppError::NotFound(format!(
                "permission '{}' is not registered in the catalog",
                input.permission_name
            )));
        }

        let user_id = input.user_id;
        self.mutations.insert_permission_override(action, input).await?;
        self.cache.invalidate(user_id).await
    }
}
