use async_trait::async_trait;
use caregrid_core::{AppResult, UserId};
use caregrid_domain::EffectivePermissionSnapshot;

/// Durable tier of the snapshot cache, keyed by user id.
///
/// Implementations store the serialized snapshot together with its content
/// hash and expiry so other processes can verify what they read.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the stored snapshot for a user, if any.
    async fn load(&self, user_id: UserId) -> AppResult<Option<EffectivePermissionSnapshot>>;

    /// Stores a snapshot, replacing any previous row for the user.
    async fn store(&self, snapshot: &EffectivePermissionSnapshot) -> AppResult<()>;

    /// Removes the stored snapshot for a user.
    async fn remove(&self, user_id: UserId) -> AppResult<()>;
}
