//! Domain model for the Caregrid authorization core.

#![forbid(unsafe_code)]

mod catalog;
mod grants;
mod permission;
mod role;
mod snapshot;

pub use catalog::PermissionCatalog;
pub use grants::{OverrideAction, PermissionOverride, ResourceAccessGrant, RoleAssignment};
pub use permission::{AccessLevel, PermissionDefinition, PermissionName};
pub use role::{PermissionSet, Role, RoleGraph, RoleGraphNode, RoleKind};
pub use snapshot::EffectivePermissionSnapshot;
