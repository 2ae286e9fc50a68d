use std::collections::BTreeSet;

use caregrid_core::OrgId;
use caregrid_domain::{PermissionName, Role, RoleGraphNode, RoleKind};

use super::*;

impl PostgresGrantRepository {
    /// Loads the inheritance closure for a set of roles in three reads:
    /// reachable roles via a recursive walk, then their inheritance edges
    /// and attached permissions.
    pub(super) async fn load_role_graph_impl(&self, role_ids: &[RoleId]) -> AppResult<RoleGraph> {
        let seed_ids: Vec<Uuid> = role_ids.iter().map(|role_id| role_id.as_uuid()).collect();

        let role_rows = sqlx::query_as::<_, RoleRow>(
            r#"
            WITH RECURSIVE reachable AS (
                SELECT id
                FROM rbac_roles
                WHERE id = ANY($1)
                UNION
                SELECT inheritance.parent_role_id
                FROM rbac_role_inheritance AS inheritance
                INNER JOIN reachable
                    ON reachable.id = inheritance.role_id
            )
            SELECT
                roles.id,
                roles.name,
                roles.organization_id,
                roles.is_system
            FROM rbac_roles AS roles
            INNER JOIN reachable
                ON reachable.id = roles.id
            "#,
        )
        .bind(&seed_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to load reachable roles: {error}"))
        })?;

        let reachable_ids: Vec<Uuid> = role_rows.iter().map(|row| row.id).collect();

        let inheritance_rows = sqlx::query_as::<_, InheritanceRow>(
            r#"
            SELECT role_id, parent_role_id
            FROM rbac_role_inheritance
            WHERE role_id = ANY($1)
            "#,
        )
        .bind(&reachable_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to load role inheritance: {error}"))
        })?;

        let permission_rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT role_id, permission
            FROM rbac_role_permissions
            WHERE role_id = ANY($1)
            "#,
        )
        .bind(&reachable_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to load role permissions: {error}"))
        })?;

        let mut graph = RoleGraph::new();
        for row in role_rows {
            let parents: Vec<RoleId> = inheritance_rows
                .iter()
                .filter(|edge| edge.role_id == row.id)
                .map(|edge| RoleId::from_uuid(edge.parent_role_id))
                .collect();

            let mut permissions: BTreeSet<PermissionName> = BTreeSet::new();
            for permission_row in permission_rows
                .iter()
                .filter(|permission_row| permission_row.role_id == row.id)
            {
                let permission = PermissionName::new(permission_row.permission.as_str())
                    .map_err(|error| {
                        AppError::Internal(format!(
                            "failed to decode role permission '{}' for role '{}': {error}",
                            permission_row.permission, row.id
                        ))
                    })?;
                permissions.insert(permission);
            }

            graph.insert(RoleGraphNode {
                role: Role {
                    id: RoleId::from_uuid(row.id),
                    name: row.name,
                    organization_id: row.organization_id.map(OrgId::from_uuid),
                    kind: if row.is_system {
                        RoleKind::System
                    } else {
                        RoleKind::Regular
                    },
                },
                parents,
                permissions,
            });
        }

        Ok(graph)
    }
}
