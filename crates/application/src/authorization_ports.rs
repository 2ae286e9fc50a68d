//! Ports consumed by the authorization services.

mod grants;
mod mutations;
mod snapshots;

pub use grants::{GrantRepository, RoleGraphRepository};
pub use mutations::{AssignRoleInput, GrantMutationRepository, PermissionOverrideInput};
pub use snapshots::SnapshotStore;
