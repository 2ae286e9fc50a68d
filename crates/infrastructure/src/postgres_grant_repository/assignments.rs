use caregrid_core::{DepartmentId, OrgId};

use super::*;

impl PostgresGrantRepository {
    pub(super) async fn active_role_assignments_impl(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        scope: Option<OrgScope>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let scope_organization = scope.map(|scope| scope.organization_id.as_uuid());
        let scope_department = scope
            .and_then(|scope| scope.department_id)
            .map(|department_id| department_id.as_uuid());

        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                user_id,
                role_id,
                organization_id,
                department_id,
                valid_from,
                valid_until,
                is_active
            FROM rbac_role_assignments
            WHERE user_id = $1
              AND is_active = true
              AND valid_from <= $2
              AND (valid_until IS NULL OR valid_until > $2)
              AND ($3::UUID IS NULL OR organization_id IS NULL OR organization_id = $3)
              AND ($4::UUID IS NULL OR department_id IS NULL OR department_id = $4)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .bind(scope_organization)
        .bind(scope_department)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to load role assignments: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| RoleAssignment {
                user_id: UserId::from_uuid(row.user_id),
                role_id: RoleId::from_uuid(row.role_id),
                organization_id: row.organization_id.map(OrgId::from_uuid),
                department_id: row.department_id.map(DepartmentId::from_uuid),
                valid_from: row.valid_from,
                valid_until: row.valid_until,
                is_active: row.is_active,
            })
            .collect())
    }
}
