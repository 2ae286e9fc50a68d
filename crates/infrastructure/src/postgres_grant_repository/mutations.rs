use super::*;

impl PostgresGrantRepository {
    pub(super) async fn insert_role_assignment_impl(
        &self,
        input: AssignRoleInput,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rbac_role_assignments (
                user_id,
                role_id,
                organization_id,
                department_id,
                valid_from,
                valid_until,
                is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, true)
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.role_id.as_uuid())
        .bind(input.organization_id.map(|organization_id| organization_id.as_uuid()))
        .bind(input.department_id.map(|department_id| department_id.as_uuid()))
        .bind(input.valid_from)
        .bind(input.valid_until)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to insert role assignment: {error}"))
        })?;

        Ok(())
    }

    pub(super) async fn insert_permission_override_impl(
        &self,
        action: OverrideAction,
        input: PermissionOverrideInput,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rbac_direct_permissions (
                user_id,
                permission,
                action,
                valid_from,
                valid_until,
                granted_by,
                notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(input.user_id.as_uuid())
        .bind(input.permission_name.as_str())
        .bind(action.as_str())
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(input.granted_by.as_uuid())
        .bind(input.notes)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to insert permission override: {error}"))
        })?;

        Ok(())
    }
}
