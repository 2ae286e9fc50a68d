//! Application services and ports for the Caregrid authorization core.

#![forbid(unsafe_code)]

mod authorization_config;
mod authorization_ports;
mod authorization_service;
mod effective_permission_resolver;
mod snapshot_cache;

pub use authorization_config::AuthorizationConfig;
pub use authorization_ports::{
    AssignRoleInput, GrantMutationRepository, GrantRepository, PermissionOverrideInput,
    RoleGraphRepository, SnapshotStore,
};
pub use authorization_service::AuthorizationService;
pub use effective_permission_resolver::EffectivePermissionResolver;
pub use snapshot_cache::{CacheStats, SnapshotCache};
