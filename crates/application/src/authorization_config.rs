use std::time::Duration;

/// Tunables for snapshot resolution and caching.
///
/// Constructed once and injected; there is no module-level state.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    /// How long a computed snapshot is served before it expires.
    pub snapshot_ttl: chrono::Duration,
    /// Upper bound for each individual store call.
    pub store_timeout: Duration,
    /// How often a computation is retried after a concurrent invalidation
    /// before its freshest result is returned uncached.
    pub recompute_attempts: u32,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl: chrono::Duration::hours(1),
            store_timeout: Duration::from_secs(5),
            recompute_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AuthorizationConfig;

    #[test]
    fn default_ttl_is_one_hour() {
        let config = AuthorizationConfig::default();
        assert_eq!(config.snapshot_ttl, chrono::Duration::hours(1));
        assert!(config.recompute_attempts > 0);
    }
}
