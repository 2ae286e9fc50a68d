use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use caregrid_core::{AppError, AppResult, OrgScope, RoleId, UserId};
use caregrid_domain::{
    EffectivePermissionSnapshot, PermissionName, PermissionSet, RoleGraph,
};
use chrono::Utc;

use crate::authorization_config::AuthorizationConfig;
use crate::authorization_ports::{GrantRepository, RoleGraphRepository};

/// Merges role grants, direct overrides and resource ACLs into a snapshot.
///
/// The merge is deterministic: role union plus grant overrides, minus
/// revoke overrides, with revokes winning over every contributing source.
#[derive(Clone)]
pub struct EffectivePermissionResolver {
    grants: Arc<dyn GrantRepository>,
    roles: Arc<dyn RoleGraphRepository>,
    config: AuthorizationConfig,
}

impl EffectivePermissionResolver {
    /// Creates a resolver over the grant and role graph ports.
    #[must_use]
    pub fn new(
        grants: Arc<dyn GrantRepository>,
        roles: Arc<dyn RoleGraphRepository>,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            grants,
            roles,
            config,
        }
    }

    /// Computes a fresh snapshot for a user under an optional scope.
    ///
    /// The four store reads run concurrently; any accessor failure aborts
    /// the whole computation so the caller can fail closed.
    pub async fn resolve(
        &self,
        user_id: UserId,
        scope: Option<OrgScope>,
    ) -> AppResult<EffectivePermissionSnapshot> {
        let now = Utc::now();

        let (assignments, grant_overrides, revoke_overrides, resource_access) = tokio::join!(
            self.with_timeout(
                "role assignments",
                self.grants.active_role_assignments(user_id, now, scope),
            ),
            self.with_timeout("direct grants", self.grants.active_direct_grants(user_id, now)),
            self.with_timeout(
                "direct revokes",
                self.grants.active_direct_revokes(user_id, now),
            ),
            self.with_timeout("resource access", self.grants.resource_access(user_id)),
        );
        let assignments = assignments?;
        let grant_overrides = grant_overrides?;
        let revoke_overrides = revoke_overrides?;
        let resource_access = resource_access?;

        let role_ids: Vec<RoleId> = assignments
            .iter()
            .map(|assignment| assignment.role_id)
            .collect();
        let graph = if role_ids.is_empty() {
            RoleGraph::new()
        } else {
            self.with_timeout("role graph", self.roles.load_role_graph(&role_ids))
                .await?
        };

        let mut permissions = PermissionSet::empty();
        for assignment in &assignments {
            permissions.union_with(graph.expand(assignment.role_id)?);
        }
        permissions.union_with(PermissionSet::Named(
            grant_overrides
                .iter()
                .map(|entry| entry.permission_name.clone())
                .collect(),
        ));

        let revoked: BTreeSet<PermissionName> = revoke_overrides
            .iter()
            .map(|entry| entry.permission_name.clone())
            .collect();
        permissions.subtract(&revoked);

        Ok(EffectivePermissionSnapshot::new(
            user_id,
            scope.map(|scope| scope.organization_id),
            permissions,
            revoked,
            resource_access,
            now,
            now + self.config.snapshot_ttl,
        ))
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, future: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.config.store_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreUnavailable(format!(
                "store read '{operation}' timed out"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use caregrid_core::{AppError, AppResult, OrgId, OrgScope, RoleId, UserId};
    use caregrid_domain::{
        OverrideAction, PermissionName, PermissionOverride, PermissionSet, ResourceAccessGrant,
        Role, RoleAssignment, RoleGraph, RoleGraphNode, RoleKind,
    };
    use chrono::{DateTime, Duration, Utc};

    use super::EffectivePermissionResolver;
    use crate::authorization_config::AuthorizationConfig;
    use crate::authorization_ports::{GrantRepository, RoleGraphRepository};

    fn name(value: &str) -> PermissionName {
        let Ok(name) = PermissionName::new(value) else {
            panic!("invalid permission name '{value}' in test fixture");
        };
        name
    }

    #[derive(Default)]
    struct FakeGrantRepository {
        assignments: Vec<RoleAssignment>,
        overrides: Vec<PermissionOverride>,
        resource_access: Vec<ResourceAccessGrant>,
        fail: bool,
    }

    #[async_trait]
    impl GrantRepository for FakeGrantRepository {
        async fn active_role_assignments(
            &self,
            user_id: UserId,
            now: DateTime<Utc>,
            scope: Option<OrgScope>,
        ) -> AppResult<Vec<RoleAssignment>> {
            if self.fail {
                return Err(AppError::StoreUnavailable("assignments down".to_owned()));
            }
            Ok(self
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
            if self.fail {
                return Err(AppError::StoreUnavailable("grants down".to_owned()));
            }
            Ok(self
                .overrides
                .iter()
                .filter(|entry| {
                    entry.user_id == user_id
                        && entry.action == OverrideAction::Grant
                        && entry.is_effective_at(now)
                })
                .cloned()
                .collect())
        }

        async fn active_direct_revokes(
            &self,
            user_id: UserId,
            now: DateTime<Utc>,
        ) -> AppResult<Vec<PermissionOverride>> {
            if self.fail {
                return Err(AppError::StoreUnavailable("revokes down".to_owned()));
            }
            Ok(self
                .overrides
                .iter()
                .filter(|entry| {
                    entry.user_id == user_id
                        && entry.action == OverrideAction::Revoke
                        && entry.is_effective_at(now)
                })
                .cloned()
                .collect())
        }

        async fn resource_access(&self, user_id: UserId) -> AppResult<Vec<ResourceAccessGrant>> {
            if self.fail {
                return Err(AppError::StoreUnavailable("acl down".to_owned()));
            }
            Ok(self
                .resource_access
                .iter()
                .filter(|grant| grant.user_id == user_id)
                .cloned()
                .collect())
        }
    }

    struct FakeRoleGraphRepository {
        graph: RoleGraph,
    }

    #[async_trait]
    impl RoleGraphRepository for FakeRoleGraphRepository {
        async fn load_role_graph(&self, _role_ids: &[RoleId]) -> AppResult<RoleGraph> {
            Ok(self.graph.clone())
        }
    }

    fn regular_role(role_id: RoleId, permissions: &[&str]) -> RoleGraphNode {
        RoleGraphNode {
            role: Role {
                id: role_id,
                name: format!("role-{role_id}"),
                organization_id: None,
                kind: RoleKind::Regular,
            },
            parents: Vec::new(),
            permissions: permissions.iter().map(|value| name(value)).collect(),
        }
    }

    fn assignment(user_id: UserId, role_id: RoleId) -> RoleAssignment {
        RoleAssignment {
            user_id,
            role_id,
            organization_id: None,
            department_id: None,
            valid_from: Utc::now() - Duration::hours(1),
            valid_until: None,
            is_active: true,
        }
    }

    fn override_entry(
        user_id: UserId,
        permission: &str,
        action: OverrideAction,
    ) -> PermissionOverride {
        PermissionOverride {
            user_id,
            permission_name: name(permission),
            action,
            valid_from: Utc::now() - Duration::hours(1),
            valid_until: None,
            granted_by: UserId::new(),
            notes: None,
        }
    }

    fn resolver(
        grants: FakeGrantRepository,
        graph: RoleGraph,
    ) -> EffectivePermissionResolver {
        EffectivePermissionResolver::new(
            Arc::new(grants),
            Arc::new(FakeRoleGraphRepository { graph }),
            AuthorizationConfig::default(),
        )
    }

    #[tokio::test]
    async fn merges_roles_grants_and_revokes() {
        // A nurse: role grants device.read + maintenance.read, a direct
        // grant adds device.update, a direct revoke locks maintenance.read.
        let user_id = UserId::new();
        let nurse = RoleId::new();
        let mut graph = RoleGraph::new();
        graph.insert(regular_role(nurse, &["device.read", "maintenance.read"]));

        let grants = FakeGrantRepository {
            assignments: vec![assignment(user_id, nurse)],
            overrides: vec![
                override_entry(user_id, "device.update", OverrideAction::Grant),
                override_entry(user_id, "maintenance.read", OverrideAction::Revoke),
            ],
            ..FakeGrantRepository::default()
        };

        let result = resolver(grants, graph).resolve(user_id, None).await;
        let Ok(snapshot) = result else {
            panic!("resolution failed");
        };
        let expected: BTreeSet<PermissionName> =
            [name("device.read"), name("device.update")].into_iter().collect();
        assert_eq!(snapshot.permissions, PermissionSet::Named(expected));
        assert!(snapshot.revoked.contains(&name("maintenance.read")));
    }

    #[tokio::test]
    async fn disjoint_roles_union() {
        let user_id = UserId::new();
        let first = RoleId::new();
        let second = RoleId::new();
        let mut graph = RoleGraph::new();
        graph.insert(regular_role(first, &["device.read"]));
        graph.insert(regular_role(second, &["maintenance.read"]));

        let grants = FakeGrantRepository {
            assignments: vec![assignment(user_id, first), assignment(user_id, second)],
            ..FakeGrantRepository::default()
        };

        let result = resolver(grants, graph).resolve(user_id, None).await;
        let Ok(snapshot) = result else {
            panic!("resolution failed");
        };
        assert!(snapshot.allows(&name("device.read")));
        assert!(snapshot.allows(&name("maintenance.read")));
    }

    #[tokio::test]
    async fn system_role_resolves_to_sentinel() {
        let user_id = UserId::new();
        let system = RoleId::new();
        let mut graph = RoleGraph::new();
        graph.insert(RoleGraphNode {
            role: Role {
                id: system,
                name: "platform-admin".to_owned(),
                organization_id: None,
                kind: RoleKind::System,
            },
            parents: Vec::new(),
            permissions: BTreeSet::new(),
        });

        let grants = FakeGrantRepository {
            assignments: vec![assignment(user_id, system)],
            ..FakeGrantRepository::default()
        };

        let result = resolver(grants, graph).resolve(user_id, None).await;
        let Ok(snapshot) = result else {
            panic!("resolution failed");
        };
        assert!(snapshot.permissions.is_all());
    }

    #[tokio::test]
    async fn scoped_resolution_filters_assignments() {
        let user_id = UserId::new();
        let home_org = OrgId::new();
        let other_org = OrgId::new();
        let home_role = RoleId::new();
        let other_role = RoleId::new();
        let mut graph = RoleGraph::new();
        graph.insert(regular_role(home_role, &["device.read"]));
        graph.insert(regular_role(other_role, &["device.manage"]));

        let mut home_assignment = assignment(user_id, home_role);
        home_assignment.organization_id = Some(home_org);
        let mut other_assignment = assignment(user_id, other_role);
        other_assignment.organization_id = Some(other_org);

        let grants = FakeGrantRepository {
            assignments: vec![home_assignment, other_assignment],
            ..FakeGrantRepository::default()
        };

        let scope = OrgScope {
            organization_id: home_org,
            department_id: None,
        };
        let result = resolver(grants, graph).resolve(user_id, Some(scope)).await;
        let Ok(snapshot) = result else {
            panic!("resolution failed");
        };
        assert!(snapshot.allows(&name("device.read")));
        assert!(!snapshot.allows(&name("device.manage")));
        assert_eq!(snapshot.organization_id, Some(home_org));
    }

    #[tokio::test]
    async fn accessor_failure_aborts_resolution() {
        let grants = FakeGrantRepository {
            fail: true,
            ..FakeGrantRepository::default()
        };

        let result = resolver(grants, RoleGraph::new())
            .resolve(UserId::new(), None)
            .await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn snapshot_expiry_follows_configured_ttl() {
        let user_id = UserId::new();
        let result = resolver(FakeGrantRepository::default(), RoleGraph::new())
            .resolve(user_id, None)
            .await;
        let Ok(snapshot) = result else {
            panic!("resolution failed");
        };
        assert_eq!(
            snapshot.expires_at - snapshot.computed_at,
            chrono::Duration::hours(1)
        );
        assert!(snapshot.verify_content_hash());
    }
}
