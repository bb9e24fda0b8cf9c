//! Single-flight, TTL-bounded cache of the registry service list

use futures::future::{BoxFuture, FutureExt, Shared};
use router_core::{RegistryClient, RegistryError, ServiceMap};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cache key under which the full service list is stored
pub const SERVICES_KEY: &str = "services";

/// How long a non-empty service list is reused after it resolves
pub const SERVICE_LIST_TTL: Duration = Duration::from_millis(1000);

type QueryOutput = std::result::Result<Option<Arc<ServiceMap>>, RegistryError>;
type SharedQuery = Shared<BoxFuture<'static, QueryOutput>>;
type Entries = Arc<Mutex<HashMap<String, CacheEntry>>>;

struct CacheEntry {
    query: SharedQuery,
    generation: u64,
    created_at: Instant,
    resolved_at: Option<Instant>,
}

impl CacheEntry {
    /// Pending entries are always live; resolved ones until the TTL runs out.
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        match self.resolved_at {
            None => true,
            Some(resolved_at) => now < resolved_at + ttl,
        }
    }
}

/// ServiceCache deduplicates registry list queries.
///
/// Concurrent callers for the same key share one in-flight query. A non-empty
/// result is reused for the TTL after it resolves; an empty result or an error
/// evicts the entry at once so the next call queries again.
pub struct ServiceCache {
    registry: Arc<dyn RegistryClient>,
    ttl: Duration,
    entries: Entries,
    next_generation: AtomicU64,
}

impl ServiceCache {
    /// Create a cache with the default TTL
    pub fn new(registry: Arc<dyn RegistryClient>) -> Self {
        Self::with_ttl(registry, SERVICE_LIST_TTL)
    }

    /// Create a cache with a custom TTL
    pub fn with_ttl(registry: Arc<dyn RegistryClient>, ttl: Duration) -> Self {
        Self {
            registry,
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Get the service list for `key`, querying the registry on a miss.
    ///
    /// Returns `Ok(None)` when the registry reports no services.
    pub async fn get(&self, key: &str) -> QueryOutput {
        let query = self.lookup_or_query(key);
        query.await
    }

    /// Whether a live entry (pending or fresh) exists for `key`
    pub fn is_cached(&self, key: &str) -> bool {
        let entries = lock(&self.entries);
        entries
            .get(key)
            .map(|entry| entry.is_live(Instant::now(), self.ttl))
            .unwrap_or(false)
    }

    // The entry is installed before this returns, so callers arriving while
    // the query is in flight find it and share it.
    fn lookup_or_query(&self, key: &str) -> SharedQuery {
        let mut entries = lock(&self.entries);
        let now = Instant::now();

        if let Some(entry) = entries.get(key) {
            if entry.is_live(now, self.ttl) {
                debug!(
                    key,
                    generation = entry.generation,
                    age_ms = now.duration_since(entry.created_at).as_millis() as u64,
                    "service list cache hit"
                );
                return entry.query.clone();
            }
            entries.remove(key);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        debug!(key, generation, "service list cache miss, querying registry");

        let query = Self::query(
            self.registry.clone(),
            self.entries.clone(),
            key.to_string(),
            generation,
        );
        entries.insert(
            key.to_string(),
            CacheEntry {
                query: query.clone(),
                generation,
                created_at: now,
                resolved_at: None,
            },
        );
        drop(entries);

        // Drive the query to completion even if every caller goes away.
        tokio::spawn(query.clone());
        query
    }

    fn query(
        registry: Arc<dyn RegistryClient>,
        entries: Entries,
        key: String,
        generation: u64,
    ) -> SharedQuery {
        async move {
            let result = registry.list_services().await;
            settle(&entries, &key, generation, &result);
            match result {
                Ok(services) if services.is_empty() => Ok(None),
                Ok(services) => Ok(Some(Arc::new(services))),
                Err(e) => Err(e),
            }
        }
        .boxed()
        .shared()
    }
}

fn settle(
    entries: &Mutex<HashMap<String, CacheEntry>>,
    key: &str,
    generation: u64,
    result: &std::result::Result<ServiceMap, RegistryError>,
) {
    let mut entries = lock(entries);
    let Some(entry) = entries.get_mut(key) else {
        return;
    };
    if entry.generation != generation {
        return;
    }

    match result {
        Ok(services) if !services.is_empty() => {
            entry.resolved_at = Some(Instant::now());
        }
        Ok(_) => {
            debug!(key, generation, "registry returned no services, evicting");
            entries.remove(key);
        }
        Err(e) => {
            debug!(key, generation, error = %e, "registry query failed, evicting");
            entries.remove(key);
        }
    }
}

fn lock(
    entries: &Mutex<HashMap<String, CacheEntry>>,
) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
