//! Two-tier seen-key cache.
//!
//! Composes the in-memory [`HotCache`] with a durable [`KvStore`] behind
//! `add`/`has`. The store has no native expiry, so stale entries are
//! reclaimed lazily when a lookup finds them past the TTL.
//!
//! `has` followed by `add` is not atomic. Two callers racing on the same
//! key can both see a miss; callers get at-least-once forwarding.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;

use super::connection::CacheDb;
use super::entry;
use super::hot::HotCache;
use super::key::CacheKey;
use super::store::KvStore;
use crate::Error;

/// Default hot cache capacity.
pub const DEFAULT_HOT_CAPACITY: usize = 10_000;

/// Upper bound for the default hot cache lifetime.
pub const DEFAULT_HOT_LIFETIME: Duration = Duration::from_secs(60);

/// Tuning for a [`DedupCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Retention window of the durable store.
    pub ttl: Duration,
    /// Maximum number of keys held in memory.
    pub hot_capacity: usize,
    /// How long a key stays in memory after `add`. Must be shorter than `ttl`.
    pub hot_lifetime: Duration,
}

impl CacheOptions {
    /// Default hot settings for the given TTL.
    ///
    /// The hot lifetime is capped at half the TTL so it always stays inside
    /// the retention window.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, hot_capacity: DEFAULT_HOT_CAPACITY, hot_lifetime: DEFAULT_HOT_LIFETIME.min(ttl / 2) }
    }

    /// Check the options before building a cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if:
    /// - `ttl` is zero
    /// - `hot_capacity` is zero
    /// - `hot_lifetime` is not strictly shorter than `ttl`
    pub fn validate(&self) -> Result<(), Error> {
        if self.ttl.is_zero() {
            return Err(Error::InvalidInput("ttl must be greater than 0".into()));
        }
        if self.hot_capacity == 0 {
            return Err(Error::InvalidInput("hot_capacity must be greater than 0".into()));
        }
        if self.hot_lifetime >= self.ttl {
            return Err(Error::InvalidInput(format!(
                "hot_lifetime ({:?}) must be shorter than ttl ({:?})",
                self.hot_lifetime, self.ttl
            )));
        }
        Ok(())
    }
}

/// Seen-key cache with a TTL, backed by a durable store.
pub struct DedupCache<S = CacheDb> {
    store: S,
    hot: HotCache,
    ttl: Duration,
}

impl DedupCache<CacheDb> {
    /// Open the SQLite store at `path` with default hot settings.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or migrated, or if `ttl` is zero.
    pub async fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self, Error> {
        Self::open_with(path, CacheOptions::with_ttl(ttl)).await
    }

    /// Open the SQLite store at `path` with explicit options.
    pub async fn open_with(path: impl AsRef<Path>, options: CacheOptions) -> Result<Self, Error> {
        options.validate()?;
        let store = CacheDb::open(path).await?;
        Self::new(store, options)
    }
}

impl<S: KvStore> DedupCache<S> {
    /// Build a cache over an already opened store.
    pub fn new(store: S, options: CacheOptions) -> Result<Self, Error> {
        options.validate()?;
        let capacity = NonZeroUsize::new(options.hot_capacity)
            .ok_or_else(|| Error::InvalidInput("hot_capacity must be greater than 0".into()))?;

        Ok(Self { store, hot: HotCache::new(capacity, options.hot_lifetime), ttl: options.ttl })
    }

    /// Record `key` as seen now.
    ///
    /// The store write happens first; the hot layer is only updated once it
    /// succeeded.
    pub async fn add(&self, key: &CacheKey) -> Result<(), Error> {
        let stamp = entry::encode(Utc::now());
        self.store.put(key.as_bytes(), &stamp).await?;
        self.hot.set(key.as_str());
        Ok(())
    }

    /// Whether `key` was added within the TTL.
    ///
    /// Expired or undecodable entries are deleted on the way out. A failed
    /// delete is logged and otherwise ignored.
    pub async fn has(&self, key: &CacheKey) -> Result<bool, Error> {
        if self.hot.get(key.as_str()) {
            tracing::trace!(%key, "hot cache hit");
            return Ok(true);
        }

        let Some(value) = self.store.get(key.as_bytes()).await? else {
            return Ok(false);
        };

        match entry::decode(&value) {
            Ok(inserted_at) if !entry::is_expired(inserted_at, Utc::now(), self.ttl) => Ok(true),
            Ok(inserted_at) => {
                tracing::debug!(%key, %inserted_at, "entry expired, reclaiming");
                self.reclaim(key).await;
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "unreadable entry, reclaiming");
                self.reclaim(key).await;
                Ok(false)
            }
        }
    }

    async fn reclaim(&self, key: &CacheKey) {
        if let Err(e) = self.store.delete(key.as_bytes()).await {
            let err = Error::Reclamation { key: key.to_string(), source: Box::new(e) };
            tracing::warn!(error = %err, "failed to reclaim expired entry");
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Direct access to the durable layer.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Close the durable store.
    pub async fn close(self) -> Result<(), Error> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Wraps a real store and can be switched into failing mode per operation.
    #[derive(Default)]
    struct FaultyStore {
        inner: Option<CacheDb>,
        fail_get: AtomicBool,
        fail_put: AtomicBool,
        fail_delete: AtomicBool,
        gets: AtomicUsize,
    }

    impl FaultyStore {
        async fn new() -> Self {
            Self { inner: Some(CacheDb::open_in_memory().await.unwrap()), ..Default::default() }
        }

        fn db(&self) -> &CacheDb {
            self.inner.as_ref().unwrap()
        }

        fn injected() -> Error {
            Error::Database(tokio_rusqlite::Error::ConnectionClosed)
        }
    }

    #[async_trait::async_trait]
    impl KvStore for FaultyStore {
        async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.db().put(key, value).await
        }

        async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.db().get(key).await
        }

        async fn delete(&self, key: &[u8]) -> Result<(), Error> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(Self::injected());
            }
            self.db().delete(key).await
        }

        async fn close(&self) -> Result<(), Error> {
            KvStore::close(self.db()).await
        }
    }

    fn short_options() -> CacheOptions {
        CacheOptions { ttl: Duration::from_millis(300), hot_capacity: 16, hot_lifetime: Duration::from_millis(50) }
    }

    async fn memory_cache(options: CacheOptions) -> DedupCache {
        DedupCache::new(CacheDb::open_in_memory().await.unwrap(), options).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_has() {
        let cache = memory_cache(CacheOptions::with_ttl(Duration::from_secs(3600))).await;
        let key = CacheKey::normalize("http://www.example.com/x");

        assert!(!cache.has(&key).await.unwrap());
        cache.add(&key).await.unwrap();
        assert!(cache.has(&key).await.unwrap());
        assert!(cache.has(&CacheKey::normalize("https://example.com/x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_after_hot_lifetime_uses_store() {
        let cache = memory_cache(short_options()).await;
        let key = CacheKey::normalize("example.com/a");
        cache.add(&key).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_is_reclaimed() {
        let cache = memory_cache(short_options()).await;
        let key = CacheKey::normalize("example.com/a");
        cache.add(&key).await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(!cache.has(&key).await.unwrap());
        assert!(cache.store().get(key.as_bytes()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_re_add_after_expiry() {
        let cache = memory_cache(short_options()).await;
        let key = CacheKey::normalize("example.com/a");
        cache.add(&key).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!cache.has(&key).await.unwrap());

        cache.add(&key).await.unwrap();
        assert!(cache.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_hot_hit_skips_store() {
        let store = FaultyStore::new().await;
        let cache = DedupCache::new(store, CacheOptions::with_ttl(Duration::from_secs(3600))).unwrap();
        let key = CacheKey::normalize("example.com/a");
        cache.add(&key).await.unwrap();

        cache.store().fail_get.store(true, Ordering::SeqCst);

        for _ in 0..3 {
            assert!(cache.has(&key).await.unwrap());
        }
        assert_eq!(cache.store().gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_read_failure_propagates() {
        let store = FaultyStore::new().await;
        store.fail_get.store(true, Ordering::SeqCst);
        let cache = DedupCache::new(store, CacheOptions::with_ttl(Duration::from_secs(3600))).unwrap();

        let result = cache.has(&CacheKey::normalize("example.com/a")).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_store_write_failure_propagates_and_skips_hot() {
        let store = FaultyStore::new().await;
        store.fail_put.store(true, Ordering::SeqCst);
        let cache = DedupCache::new(store, CacheOptions::with_ttl(Duration::from_secs(3600))).unwrap();
        let key = CacheKey::normalize("example.com/a");

        assert!(cache.add(&key).await.is_err());

        cache.store().fail_put.store(false, Ordering::SeqCst);
        assert!(!cache.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_reclaim_is_swallowed() {
        let store = FaultyStore::new().await;
        store.fail_delete.store(true, Ordering::SeqCst);
        let cache = DedupCache::new(store, short_options()).unwrap();
        let key = CacheKey::normalize("example.com/a");
        cache.add(&key).await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(!cache.has(&key).await.unwrap());
        assert!(cache.store().db().get(key.as_bytes()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reclaimed() {
        let cache = memory_cache(CacheOptions::with_ttl(Duration::from_secs(3600))).await;
        let key = CacheKey::normalize("example.com/legacy");
        cache.store().put(key.as_bytes(), b"").await.unwrap();

        assert!(!cache.has(&key).await.unwrap());
        assert!(cache.store().get(key.as_bytes()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_adds_and_lookups() {
        let cache = Arc::new(memory_cache(CacheOptions::with_ttl(Duration::from_secs(3600))).await);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                let key = CacheKey::normalize(&format!("https://example.com/{}", i % 4));
                cache.add(&key).await.unwrap();
                cache.has(&key).await.unwrap()
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(cache.store().entry_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("crawl-cache");
        let key = CacheKey::normalize("http://www.site.com/a");

        let cache = DedupCache::open(&path, Duration::from_secs(3600)).await.unwrap();
        cache.add(&key).await.unwrap();
        cache.close().await.unwrap();

        let reopened = DedupCache::open(&path, Duration::from_secs(3600)).await.unwrap();
        assert!(reopened.has(&key).await.unwrap());
    }

    #[test]
    fn test_default_options_fit_inside_ttl() {
        let options = CacheOptions::with_ttl(Duration::from_secs(10));
        assert_eq!(options.hot_lifetime, Duration::from_secs(5));
        assert!(options.validate().is_ok());

        let options = CacheOptions::with_ttl(Duration::from_secs(7 * 24 * 3600));
        assert_eq!(options.hot_lifetime, DEFAULT_HOT_LIFETIME);
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let zero_ttl = CacheOptions { ttl: Duration::ZERO, ..CacheOptions::with_ttl(Duration::from_secs(1)) };
        assert!(matches!(zero_ttl.validate(), Err(Error::InvalidInput(_))));

        let zero_capacity = CacheOptions { hot_capacity: 0, ..CacheOptions::with_ttl(Duration::from_secs(60)) };
        assert!(matches!(zero_capacity.validate(), Err(Error::InvalidInput(_))));

        let long_hot = CacheOptions {
            ttl: Duration::from_secs(60),
            hot_capacity: 10,
            hot_lifetime: Duration::from_secs(60),
        };
        assert!(matches!(long_hot.validate(), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_open_with_zero_ttl_fails_before_touching_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("crawl-cache");

        let result = DedupCache::open(&path, Duration::ZERO).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(!path.exists());
    }
}
