use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use caregrid_core::{AppError, AppResult, OrgScope, UserId};
use caregrid_domain::EffectivePermissionSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};

use crate::authorization_config::AuthorizationConfig;
use crate::authorization_ports::SnapshotStore;
use crate::effective_permission_resolver::EffectivePermissionResolver;

type FlightReceiver = watch::Receiver<Option<AppResult<EffectivePermissionSnapshot>>>;

struct Flight {
    scope: Option<OrgScope>,
    receiver: FlightReceiver,
}

/// Diagnostic counters exposed for operational dashboards.
///
/// Carries no security-relevant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Snapshots currently held in the memory tier.
    pub memory_entries: usize,
    /// Reads served from the memory tier.
    pub memory_hits: u64,
    /// Reads served from the durable tier.
    pub durable_hits: u64,
    /// Reads that required a computation.
    pub misses: u64,
    /// Targeted invalidations processed.
    pub invalidations: u64,
}

/// Two-tier snapshot cache with per-user single-flight computation.
///
/// Per-user lifecycle: miss, computing, ready, then expired or invalidated
/// back to miss. Exactly one computation runs per user at a time; racing
/// callers join the in-flight one. The durable tier is best-effort for
/// reads: when it is unavailable the cache degrades to memory-only rather
/// than failing a decision.
///
/// Cloning yields another handle to the same cache.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    resolver: EffectivePermissionResolver,
    durable: Arc<dyn SnapshotStore>,
    entries: RwLock<HashMap<UserId, EffectivePermissionSnapshot>>,
    flights: Mutex<HashMap<UserId, Flight>>,
    generations: Mutex<HashMap<UserId, u64>>,
    config: AuthorizationConfig,
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl SnapshotCache {
    /// Creates a cache over a resolver and a durable snapshot store.
    #[must_use]
    pub fn new(
        resolver: EffectivePermissionResolver,
        durable: Arc<dyn SnapshotStore>,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                resolver,
                durable,
                entries: RwLock::new(HashMap::new()),
                flights: Mutex::new(HashMap::new()),
                generations: Mutex::new(HashMap::new()),
                config,
                memory_hits: AtomicU64::new(0),
                durable_hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the snapshot for a user, computing it on a miss.
    ///
    /// Concurrent callers for the same uncached user converge on one store
    /// round-trip. The shared computation runs detached, so a caller that
    /// goes away cannot cancel it for the callers that remain.
    pub async fn snapshot(
        &self,
        user_id: UserId,
        scope: Option<OrgScope>,
    ) -> AppResult<EffectivePermissionSnapshot> {
        let inner = &self.inner;
        let now = Utc::now();

        if let Some(snapshot) = inner.memory_lookup(user_id, scope, now).await {
            inner.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(snapshot);
        }

        if let Some(snapshot) = inner.durable_lookup(user_id, scope, now).await {
            inner.durable_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(snapshot);
        }

        inner.misses.fetch_add(1, Ordering::Relaxed);

        let receiver = {
            let mut flights = inner.flights.lock().await;
            match flights.get(&user_id) {
                Some(flight) if flight.scope == scope => Some(flight.receiver.clone()),
                Some(_) => None,
                None => {
                    let (sender, receiver) = watch::channel(None);
                    flights.insert(
                        user_id,
                        Flight {
                            scope,
                            receiver: receiver.clone(),
                        },
                    );

                    let task_inner = Arc::clone(inner);
                    tokio::spawn(async move {
                        let result = task_inner.compute_and_store(user_id, scope).await;
                        // publish before unregistering so late joiners still
                        // observe the result instead of racing a fresh flight
                        let _ = sender.send(Some(result));
                        task_inner.flights.lock().await.remove(&user_id);
                    });

                    Some(receiver)
                }
            }
        };

        match receiver {
            Some(mut receiver) => {
                let outcome = match receiver.wait_for(|value| value.is_some()).await {
                    Ok(value) => value.clone(),
                    Err(_) => None,
                };
                outcome.unwrap_or_else(|| {
                    Err(AppError::Internal(
                        "shared snapshot computation was dropped".to_owned(),
                    ))
                })
            }
            // an in-flight computation exists for a different scope; compute
            // directly rather than serving a snapshot for the wrong scope
            None => inner.compute_and_store(user_id, scope).await,
        }
    }

    /// Removes both tiers for a user and retires in-flight computations.
    ///
    /// Memory is cleared and the invalidation generation bumped before the
    /// durable row is touched; a durable failure is returned to the
    /// mutation-side caller and never blocks readers.
    pub async fn invalidate(&self, user_id: UserId) -> AppResult<()> {
        let inner = &self.inner;
        {
            let mut generations = inner.generations.lock().await;
            *generations.entry(user_id).or_insert(0) += 1;
        }
        inner.entries.write().await.remove(&user_id);
        inner.invalidations.fetch_add(1, Ordering::Relaxed);

        inner.durable.remove(user_id).await.map_err(|error| {
            tracing::warn!(
                user_id = %user_id,
                error = %error,
                "durable snapshot removal failed during invalidation"
            );
            error
        })
    }

    /// Invalidates a batch of users, reporting the first durable failure.
    pub async fn invalidate_bulk(&self, user_ids: &[UserId]) -> AppResult<()> {
        let mut first_failure = None;
        for user_id in user_ids {
            if let Err(error) = self.invalidate(*user_id).await {
                first_failure.get_or_insert(error);
            }
        }
        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Returns current diagnostic counters.
    pub async fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        CacheStats {
            memory_entries: inner.entries.read().await.len(),
            memory_hits: inner.memory_hits.load(Ordering::Relaxed),
            durable_hits: inner.durable_hits.load(Ordering::Relaxed),
            misses: inner.misses.load(Ordering::Relaxed),
            invalidations: inner.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl CacheInner {
    async fn memory_lookup(
        &self,
        user_id: UserId,
        scope: Option<OrgScope>,
        now: DateTime<Utc>,
    ) -> Option<EffectivePermissionSnapshot> {
        let organization_id = scope.map(|scope| scope.organization_id);
        {
            let entries = self.entries.read().await;
            match entries.get(&user_id) {
                Some(snapshot) => {
                    if !snapshot.is_expired_at(now) && snapshot.organization_id == organization_id {
                        return Some(snapshot.clone());
                    }
                }
                None => return None,
            }
        }

        // expired entries are dropped; a scope mismatch keeps the entry and
        // lets the recomputed snapshot replace it
        let mut entries = self.entries.write().await;
        if entries
            .get(&user_id)
            .is_some_and(|snapshot| snapshot.is_expired_at(now))
        {
            entries.remove(&user_id);
        }

        None
    }

    async fn durable_lookup(
        &self,
        user_id: UserId,
        scope: Option<OrgScope>,
        now: DateTime<Utc>,
    ) -> Option<EffectivePermissionSnapshot> {
        let loaded = match self.durable.load(user_id).await {
            Ok(loaded) => loaded,
            Err(error) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %error,
                    "durable snapshot read failed; degrading to memory-only caching"
                );
                return None;
            }
        };

        let snapshot = loaded?;
        if snapshot.is_expired_at(now) {
            return None;
        }
        if snapshot.organization_id != scope.map(|scope| scope.organization_id) {
            return None;
        }
        if !snapshot.verify_content_hash() {
            tracing::warn!(
                user_id = %user_id,
                "durable snapshot failed content hash verification; discarding"
            );
            if let Err(error) = self.durable.remove(user_id).await {
                tracing::warn!(
                    user_id = %user_id,
                    error = %error,
                    "failed to remove snapshot with mismatched hash"
                );
            }
            return None;
        }

        self.entries
            .write()
            .await
            .insert(user_id, snapshot.clone());
        Some(snapshot)
    }

    /// Runs one computation and publishes it to both tiers.
    ///
    /// A generation bump observed after computing means an invalidation ran
    /// concurrently; the stale result is discarded and recomputed instead
    /// of being served.
    async fn compute_and_store(
        &self,
        user_id: UserId,
        scope: Option<OrgScope>,
    ) -> AppResult<EffectivePermissionSnapshot> {
        let mut attempts = 0;
        loop {
            let generation = self.generation_of(user_id).await;
            let snapshot = self.resolver.resolve(user_id, scope).await?;

            if self.generation_of(user_id).await == generation {
                self.entries
                    .write()
                    .await
                    .insert(user_id, snapshot.clone());
                if let Err(error) = self.durable.store(&snapshot).await {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %error,
                        "durable snapshot write failed; continuing memory-only"
                    );
                }
                return Ok(snapshot);
            }

            attempts += 1;
            if attempts >= self.config.recompute_attempts {
                tracing::warn!(
                    user_id = %user_id,
                    attempts,
                    "snapshot kept being invalidated during computation; returning freshest result uncached"
                );
                return Ok(snapshot);
            }
        }
    }

    async fn generation_of(&self, user_id: UserId) -> u64 {
        self.generations
            .lock()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }
}
