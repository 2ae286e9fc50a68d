//! Infrastructure adapters for the authorization application ports.

#![forbid(unsafe_code)]

mod in_memory_grant_repository;
mod in_memory_snapshot_store;
mod postgres_grant_repository;
mod postgres_snapshot_store;
mod redis_snapshot_store;

pub use in_memory_grant_repository::InMemoryGrantRepository;
pub use in_memory_snapshot_store::InMemorySnapshotStore;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use postgres_snapshot_store::PostgresSnapshotStore;
pub use redis_snapshot_store::RedisSnapshotStore;
