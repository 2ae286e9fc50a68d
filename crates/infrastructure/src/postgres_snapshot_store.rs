//! PostgreSQL-backed durable tier of the snapshot cache.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use caregrid_application::SnapshotStore;
use caregrid_core::{AppError, AppResult, UserId};
use caregrid_domain::EffectivePermissionSnapshot;

/// Durable snapshot store over the `rbac_snapshot_cache` table.
///
/// One row per user: content hash, serialized snapshot and expiry. Rows
/// that fail to decode or whose hash column disagrees with the payload are
/// treated as absent; the cache recomputes instead of serving them.
#[derive(Clone)]
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    content_hash: String,
    snapshot: String,
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn load(&self, user_id: UserId) -> AppResult<Option<EffectivePermissionSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT content_hash, snapshot
            FROM rbac_snapshot_cache
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to read snapshot row: {error}"))
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let snapshot: EffectivePermissionSnapshot = match serde_json::from_str(&row.snapshot) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %error,
                    "stored snapshot failed to decode; treating as absent"
                );
                return Ok(None);
            }
        };

        if snapshot.content_hash != row.content_hash {
            tracing::warn!(
                user_id = %user_id,
                "stored snapshot hash column disagrees with payload; treating as absent"
            );
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    async fn store(&self, snapshot: &EffectivePermissionSnapshot) -> AppResult<()> {
        let payload = serde_json::to_string(snapshot).map_err(|error| {
            AppError::Internal(format!("failed to encode snapshot: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO rbac_snapshot_cache (user_id, content_hash, snapshot, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET content_hash = EXCLUDED.content_hash,
                snapshot = EXCLUDED.snapshot,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(snapshot.user_id.as_uuid())
        .bind(snapshot.content_hash.as_str())
        .bind(payload)
        .bind(snapshot.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to write snapshot row: {error}"))
        })?;

        Ok(())
    }

    async fn remove(&self, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM rbac_snapshot_cache
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to remove snapshot row: {error}"))
        })?;

        Ok(())
    }
}
