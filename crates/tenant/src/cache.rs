use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ringline_core::{TenantConfig, TenantId};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::normalize::normalize;
use crate::source::ConfigSource;

/// Where a returned snapshot came from. Callers that care (health reporting)
/// can distinguish live backend data from fallback data; call handling
/// treats both the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOrigin {
    Live,
    Fallback,
}

impl ConfigOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        }
    }
}

struct Entry {
    config: Arc<TenantConfig>,
    origin: ConfigOrigin,
    expires_at: Instant,
}

/// Memoizes normalized tenant configuration with a uniform TTL.
///
/// Concurrent misses for the same tenant coalesce into one backend fetch via
/// a per-tenant flight lock; misses for different tenants refresh in
/// parallel. A failed primary fetch falls back to the local source and, as a
/// last resort, an empty default snapshot — `get` never errors, a tenant is
/// never left without configuration.
pub struct ConfigCache {
    primary: Arc<dyn ConfigSource>,
    fallback: Arc<dyn ConfigSource>,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<TenantId, Entry>>,
    flights: Mutex<HashMap<TenantId, Arc<AsyncMutex<()>>>>,
}

impl ConfigCache {
    pub fn new(
        primary: Arc<dyn ConfigSource>,
        fallback: Arc<dyn ConfigSource>,
        ttl: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, tenant: &TenantId) -> (Arc<TenantConfig>, ConfigOrigin) {
        if let Some(hit) = self.lookup(tenant) {
            return hit;
        }

        let flight = self.flight_lock(tenant);
        let _guard = flight.lock().await;

        // A coalesced caller may have refreshed while we waited on the flight.
        if let Some(hit) = self.lookup(tenant) {
            return hit;
        }

        let (config, origin) = self.refresh(tenant).await;
        self.store(tenant, config.clone(), origin);
        (config, origin)
    }

    /// Evicts every entry immediately. Idempotent.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock_entries().values().filter(|entry| entry.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lookup(&self, tenant: &TenantId) -> Option<(Arc<TenantConfig>, ConfigOrigin)> {
        let entries = self.lock_entries();
        let entry = entries.get(tenant)?;
        (entry.expires_at > Instant::now()).then(|| (entry.config.clone(), entry.origin))
    }

    fn store(&self, tenant: &TenantId, config: Arc<TenantConfig>, origin: ConfigOrigin) {
        let mut entries = self.lock_entries();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() >= self.capacity && !entries.contains_key(tenant) {
            // At capacity: drop the entry closest to expiry.
            if let Some(evict) =
                entries.iter().min_by_key(|(_, entry)| entry.expires_at).map(|(id, _)| id.clone())
            {
                entries.remove(&evict);
            }
        }
        entries.insert(tenant.clone(), Entry { config, origin, expires_at: now + self.ttl });
    }

    async fn refresh(&self, tenant: &TenantId) -> (Arc<TenantConfig>, ConfigOrigin) {
        let started = Instant::now();
        match self.primary.fetch_raw(tenant).await {
            Ok(tables) => {
                info!(
                    tenant = %tenant,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "tenant config fetched from backend"
                );
                (Arc::new(normalize(tables)), ConfigOrigin::Live)
            }
            Err(primary_err) => {
                warn!(
                    tenant = %tenant,
                    error = %primary_err,
                    "config backend fetch failed, using local fallback"
                );
                match self.fallback.fetch_raw(tenant).await {
                    Ok(tables) => (Arc::new(normalize(tables)), ConfigOrigin::Fallback),
                    Err(fallback_err) => {
                        error!(
                            tenant = %tenant,
                            error = %fallback_err,
                            "local fallback also failed, serving empty default config"
                        );
                        (Arc::new(TenantConfig::default()), ConfigOrigin::Fallback)
                    }
                }
            }
        }
    }

    fn flight_lock(&self, tenant: &TenantId) -> Arc<AsyncMutex<()>> {
        let mut flights = self.flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        flights.entry(tenant.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<TenantId, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use ringline_core::TenantId;

    use super::{ConfigCache, ConfigOrigin};
    use crate::source::{ConfigSource, RawTables, SourceError};

    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: false })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay, fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay: Duration::ZERO, fail: true })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConfigSource for CountingSource {
        async fn fetch_raw(&self, _tenant: &TenantId) -> Result<RawTables, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SourceError::Transport("backend unreachable".to_owned()));
            }
            let mut tables = RawTables::default();
            let mut row = std::collections::BTreeMap::new();
            row.insert("key".to_owned(), "store_name".to_owned());
            row.insert("value".to_owned(), "Cannon Hill Phones".to_owned());
            tables.settings.push(row);
            Ok(tables)
        }
    }

    fn cache_with(
        primary: Arc<CountingSource>,
        fallback: Arc<CountingSource>,
        ttl: Duration,
    ) -> Arc<ConfigCache> {
        Arc::new(ConfigCache::new(primary, fallback, ttl, 100))
    }

    #[tokio::test]
    async fn second_get_within_ttl_reuses_snapshot_without_refetch() {
        let primary = CountingSource::new();
        let cache = cache_with(primary.clone(), CountingSource::new(), Duration::from_secs(180));
        let tenant = TenantId::from("cannonhill");

        let (first, origin) = cache.get(&tenant).await;
        let (second, _) = cache.get(&tenant).await;

        assert_eq!(origin, ConfigOrigin::Live);
        assert!(Arc::ptr_eq(&first, &second), "same snapshot should be shared");
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_for_same_tenant_coalesce_to_one_fetch() {
        let primary = CountingSource::slow(Duration::from_millis(50));
        let cache = cache_with(primary.clone(), CountingSource::new(), Duration::from_secs(180));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.get(&TenantId::from("cannonhill")).await
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        assert_eq!(primary.calls(), 1, "misses must coalesce into a single fetch");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_tenants_refresh_independently_and_in_parallel() {
        let primary = CountingSource::slow(Duration::from_millis(200));
        let cache = cache_with(primary.clone(), CountingSource::new(), Duration::from_secs(180));

        let started = std::time::Instant::now();
        let a = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&TenantId::from("tenant-a")).await })
        };
        let b = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&TenantId::from("tenant-b")).await })
        };
        a.await.expect("task should not panic");
        b.await.expect("task should not panic");

        assert_eq!(primary.calls(), 2, "each tenant fetches once");
        assert!(
            started.elapsed() < Duration::from_millis(390),
            "tenant refreshes should overlap, not serialize"
        );
    }

    #[tokio::test]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let primary = CountingSource::new();
        let cache = cache_with(primary.clone(), CountingSource::new(), Duration::from_millis(10));
        let tenant = TenantId::from("cannonhill");

        cache.get(&tenant).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.get(&tenant).await;

        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn primary_failure_falls_back_with_fallback_origin() {
        let fallback = CountingSource::new();
        let cache = cache_with(CountingSource::failing(), fallback.clone(), Duration::from_secs(180));

        let (config, origin) = cache.get(&TenantId::from("cannonhill")).await;

        assert_eq!(origin, ConfigOrigin::Fallback);
        assert_eq!(config.setting("store_name"), Some("Cannon Hill Phones"));
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn both_sources_failing_yields_empty_default_config() {
        let cache =
            cache_with(CountingSource::failing(), CountingSource::failing(), Duration::from_secs(180));

        let (config, origin) = cache.get(&TenantId::from("cannonhill")).await;

        assert_eq!(origin, ConfigOrigin::Fallback);
        assert!(config.settings.is_empty(), "last-resort config is the empty default");
    }

    #[tokio::test]
    async fn clear_evicts_everything_and_is_idempotent() {
        let primary = CountingSource::new();
        let cache = cache_with(primary.clone(), CountingSource::new(), Duration::from_secs(180));
        let tenant = TenantId::from("cannonhill");

        cache.get(&tenant).await;
        assert_eq!(cache.len(), 1);

        cache.clear();
        cache.clear();
        assert!(cache.is_empty());

        cache.get(&tenant).await;
        assert_eq!(primary.calls(), 2, "cleared entry must be refetched");
    }

    #[tokio::test]
    async fn capacity_bound_evicts_entry_closest_to_expiry() {
        let primary = CountingSource::new();
        let cache = Arc::new(ConfigCache::new(
            primary.clone(),
            CountingSource::new(),
            Duration::from_secs(180),
            2,
        ));

        cache.get(&TenantId::from("tenant-a")).await;
        cache.get(&TenantId::from("tenant-b")).await;
        cache.get(&TenantId::from("tenant-c")).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
    }
}
