//! Redis-backed durable tier of the snapshot cache.

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;

use caregrid_application::SnapshotStore;
use caregrid_core::{AppError, AppResult, UserId};
use caregrid_domain::EffectivePermissionSnapshot;

/// Redis implementation of the snapshot store port.
///
/// Entries carry the snapshot's remaining lifetime as the redis TTL, so
/// expired rows vanish without a sweeper.
#[derive(Clone)]
pub struct RedisSnapshotStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSnapshotStore {
    /// Creates a store adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, user_id: UserId) -> String {
        format!("{}:{user_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to connect to redis: {error}"))
            })
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn load(&self, user_id: UserId) -> AppResult<Option<EffectivePermissionSnapshot>> {
        let key = self.key_for(user_id);
        let mut connection = self.connection().await?;

        let encoded: Option<String> = connection.get(key).await.map_err(|error| {
            AppError::StoreUnavailable(format!("failed to read snapshot entry: {error}"))
        })?;

        encoded
            .as_deref()
            .map(|payload| {
                serde_json::from_str(payload).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid snapshot entry for user '{user_id}': {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn store(&self, snapshot: &EffectivePermissionSnapshot) -> AppResult<()> {
        let ttl_seconds = (snapshot.expires_at - Utc::now()).num_seconds();
        if ttl_seconds <= 0 {
            return Ok(());
        }

        let key = self.key_for(snapshot.user_id);
        let payload = serde_json::to_string(snapshot).map_err(|error| {
            AppError::Internal(format!("failed to encode snapshot: {error}"))
        })?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(key, payload, ttl_seconds.unsigned_abs())
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to write snapshot entry: {error}"))
            })
    }

    async fn remove(&self, user_id: UserId) -> AppResult<()> {
        let key = self.key_for(user_id);
        let mut connection = self.connection().await?;

        connection.del(key).await.map_err(|error| {
            AppError::StoreUnavailable(format!("failed to remove snapshot entry: {error}"))
        })
    }
}
