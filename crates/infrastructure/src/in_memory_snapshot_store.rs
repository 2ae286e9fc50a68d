//! In-memory snapshot store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use caregrid_application::SnapshotStore;
use caregrid_core::{AppResult, UserId};
use caregrid_domain::EffectivePermissionSnapshot;

/// In-memory adapter for the durable snapshot tier.
///
/// Mirrors the TTL behavior of the real backends: rows past their expiry
/// are dropped on read.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    rows: RwLock<HashMap<UserId, EffectivePermissionSnapshot>>,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self, user_id: UserId) -> AppResult<Option<EffectivePermissionSnapshot>> {
        let now = Utc::now();
        {
            let rows = self.rows.read().await;
            match rows.get(&user_id) {
                Some(snapshot) => {
                    if !snapshot.is_expired_at(now) {
                        return Ok(Some(snapshot.clone()));
                    }
                }
                None => return Ok(None),
            }
        }

        let mut rows = self.rows.write().await;
        if rows
            .get(&user_id)
            .is_some_and(|snapshot| snapshot.is_expired_at(now))
        {
            rows.remove(&user_id);
        }

        Ok(None)
    }

    async fn store(&self, snapshot: &EffectivePermissionSnapshot) -> AppResult<()> {
        self.rows
            .write()
            .await
            .insert(snapshot.user_id, snapshot.clone());
        Ok(())
    }

    async fn remove(&self, user_id: UserId) -> AppResult<()> {
        self.rows.write().await.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use caregrid_application::SnapshotStore;
    use caregrid_core::UserId;
    use caregrid_domain::{EffectivePermissionSnapshot, PermissionSet};
    use chrono::{Duration, Utc};

    use super::InMemorySnapshotStore;

    fn snapshot(user_id: UserId, ttl: Duration) -> EffectivePermissionSnapshot {
        let now = Utc::now();
        EffectivePermissionSnapshot::new(
            user_id,
            None,
            PermissionSet::empty(),
            BTreeSet::new(),
            Vec::new(),
            now,
            now + ttl,
        )
    }

    #[tokio::test]
    async fn stores_and_loads_a_snapshot() {
        let store = InMemorySnapshotStore::new();
        let user_id = UserId::new();
        let original = snapshot(user_id, Duration::hours(1));

        assert!(store.store(&original).await.is_ok());
        let result = store.load(user_id).await;
        let Ok(Some(loaded)) = result else {
            panic!("stored snapshot was not returned");
        };
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn expired_rows_vanish_on_read() {
        let store = InMemorySnapshotStore::new();
        let user_id = UserId::new();
        let expired = snapshot(user_id, Duration::seconds(-1));

        assert!(store.store(&expired).await.is_ok());
        let result = store.load(user_id).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn remove_clears_the_row() {
        let store = InMemorySnapshotStore::new();
        let user_id = UserId::new();

        assert!(store.store(&snapshot(user_id, Duration::hours(1))).await.is_ok());
        assert!(store.remove(user_id).await.is_ok());
        let result = store.load(user_id).await;
        assert!(matches!(result, Ok(None)));
    }
}
