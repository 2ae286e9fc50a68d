use caregrid_domain::PermissionName;

use super::*;

impl PostgresGrantRepository {
    pub(super) async fn active_overrides_impl(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        action: OverrideAction,
    ) -> AppResult<Vec<PermissionOverride>> {
        let rows = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT
                user_id,
                permission,
                valid_from,
                valid_until,
                granted_by,
                notes
            FROM rbac_direct_permissions
            WHERE user_id = $1
              AND action = $2
              AND valid_from <= $3
              AND (valid_until IS NULL OR valid_until > $3)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(action.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to load direct permissions: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                let permission_name =
                    PermissionName::new(row.permission.as_str()).map_err(|error| {
                        AppError::Internal(format!(
                            "failed to decode direct permission '{}' for user '{user_id}': {error}",
                            row.permission
                        ))
                    })?;
                Ok(PermissionOverride {
                    user_id: UserId::from_uuid(row.user_id),
                    permission_name,
                    action,
                    valid_from: row.valid_from,
                    valid_until: row.valid_until,
                    granted_by: UserId::from_uuid(row.granted_by),
                    notes: row.notes,
                })
            })
            .collect()
    }
}
