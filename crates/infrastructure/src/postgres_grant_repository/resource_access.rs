use std::str::FromStr;

use caregrid_domain::AccessLevel;

use super::*;

impl PostgresGrantRepository {
    pub(super) async fn resource_access_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<ResourceAccessGrant>> {
        let rows = sqlx::query_as::<_, ResourceAccessRow>(
            r#"
            SELECT
                user_id,
                resource_type,
                resource_id,
                access_level
            FROM rbac_resource_access
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to load resource access: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                let access_level = AccessLevel::from_str(row.access_level.as_str())
                    .map_err(|error| {
                        AppError::Internal(format!(
                            "failed to decode access level '{}' for user '{user_id}': {error}",
                            row.access_level
                        ))
                    })?;
                Ok(ResourceAccessGrant {
                    user_id: UserId::from_uuid(row.user_id),
                    resource_type: row.resource_type,
                    resource_id: row.resource_id,
                    access_level,
                })
            })
            .collect()
    }
}
