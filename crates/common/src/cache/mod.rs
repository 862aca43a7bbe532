//! Read-through cache for storefront and catalog reads
//!
//! Provides:
//! - A `CacheBackend` trait with Redis and in-process implementations
//! - `CacheLayer::with_cache`, which never lets the cache fail a request
//! - Key builders and key / pattern invalidation

use crate::config::CacheSettings;
use crate::errors::{AppError, Result};
use crate::metrics::record_cache;
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Raw string storage used by [`CacheLayer`]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob (`*` wildcard); returns the count
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

// ============================================================================
// Redis backend
// ============================================================================

/// Redis cache client
pub struct RedisCache {
    connection: MultiplexedConnection,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to the Redis instance at `url`
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(self.key(key), value, ttl_secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.del(self.key(key)).await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.connection.clone();

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(self.key(pattern)).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(&keys).await?;
        Ok(deleted)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }
}

// ============================================================================
// In-process backend
// ============================================================================

/// moka-backed cache; each entry carries its own deadline
pub struct MemoryCache {
    entries: moka::sync::Cache<String, (String, Instant)>,
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: moka::sync::Cache::builder().max_capacity(max_entries).build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        match self.entries.get(key) {
            Some((value, deadline)) if Instant::now() < deadline => Ok(Some(value)),
            Some(_) => {
                self.entries.invalidate(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &matching {
            self.entries.invalidate(key);
        }
        Ok(matching.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Glob match supporting `*` (any run) and `?` (one character)
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

// ============================================================================
// Cache layer
// ============================================================================

/// Optional cache in front of the repository
#[derive(Clone, Default)]
pub struct CacheLayer {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend: Some(backend) }
    }

    /// Every call goes straight to the fetcher
    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Build from settings: Redis when a URL is set, moka when `in_memory`,
    /// otherwise disabled. A Redis connection failure disables the cache.
    pub async fn from_settings(settings: &CacheSettings) -> Self {
        if let Some(url) = settings.url.as_deref() {
            match RedisCache::connect(url, &settings.key_prefix).await {
                Ok(redis) => {
                    info!("Redis cache connected");
                    return Self::new(Arc::new(redis));
                }
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, running without cache");
                    return Self::disabled();
                }
            }
        }

        if settings.in_memory {
            info!("Using in-process cache");
            return Self::new(Arc::new(MemoryCache::default()));
        }

        info!("Cache not configured, reads go straight to the database");
        Self::disabled()
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Return the cached value for `key`, or run `fetcher` and cache its result.
    ///
    /// Read and decode failures count as misses. The write happens in a
    /// detached task and its failure is only logged. Fetcher errors are
    /// returned unchanged and nothing is cached for them.
    pub async fn with_cache<T, F, Fut>(&self, key: &str, ttl_secs: u64, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(backend) = self.backend.as_ref() else {
            return fetcher().await;
        };

        let namespace = key.split(':').next().unwrap_or(key);

        match backend.get_raw(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    record_cache(true, namespace);
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "Cached value undecodable, refetching"),
            },
            Ok(None) => debug!(key, "Cache miss"),
            Err(e) => warn!(key, error = %e, "Cache read failed, falling back to fetcher"),
        }
        record_cache(false, namespace);

        let value = fetcher().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                let backend = Arc::clone(backend);
                let key = key.to_string();
                tokio::spawn(async move {
                    if let Err(e) = backend.set_raw(&key, raw, ttl_secs).await {
                        warn!(key = %key, error = %e, "Cache write failed");
                    }
                });
            }
            Err(e) => warn!(key, error = %e, "Value not serializable, skipping cache write"),
        }

        Ok(value)
    }

    /// Drop one key; failures are logged
    pub async fn invalidate(&self, key: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Err(e) = backend.delete(key).await {
            warn!(key, error = %e, "Cache invalidation failed");
        }
    }

    /// Drop every key matching `pattern`; failures are logged
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match backend.delete_pattern(pattern).await {
            Ok(count) => debug!(pattern, count, "Cache pattern invalidated"),
            Err(e) => warn!(pattern, error = %e, "Cache pattern invalidation failed"),
        }
    }

    /// Ping the backend; a disabled cache is always healthy
    pub async fn ping(&self) -> Result<()> {
        match self.backend.as_ref() {
            Some(backend) => backend.ping().await,
            None => Ok(()),
        }
    }
}

/// Cache key builder helpers
pub mod keys {
    use uuid::Uuid;

    /// Public storefront page for a store slug
    pub fn store(slug: &str) -> String {
        format!("store:{}:home", slug)
    }

    /// Every cached entry for a store slug
    pub fn store_pattern(slug: &str) -> String {
        format!("store:{}:*", slug)
    }

    /// Product list of a store
    pub fn products(store_id: Uuid) -> String {
        format!("products:{}", store_id)
    }

    pub fn products_pattern(store_id: Uuid) -> String {
        format!("products:{}*", store_id)
    }

    pub fn tenant(tenant_id: Uuid) -> String {
        format!("tenant:{}", tenant_id)
    }
}
