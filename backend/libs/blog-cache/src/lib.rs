//! Blog caching layer
//!
//! Provides the cache adapter used by the blog service:
//! - Object-safe `CacheStore` trait over string values
//! - Redis implementation backed by a shared `ConnectionManager`
//! - JSON helpers with corrupt-entry eviction
//! - SCAN-based pattern matching (no blocking KEYS)

mod error;
mod keys;

pub use error::{CacheError, CacheResult};
pub use keys::CacheKey;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared Redis connection manager
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

/// Default TTL values (seconds)
pub mod ttl {
    pub const POST: u64 = 3600; // 1 hour
    pub const SEARCH: u64 = 3600; // 1 hour
}

/// Core cache operations.
///
/// Values are opaque strings; callers serialize. Keeping the trait free of
/// generic methods lets services hold it as `Arc<dyn CacheStore>`.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value from cache
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value in cache with TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a key from cache. Deleting a missing key succeeds.
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// List keys matching a glob pattern
    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> CacheResult<()>;
}

/// Typed helpers layered over any `CacheStore`.
#[async_trait::async_trait]
pub trait CacheStoreExt: CacheStore {
    /// Read and decode a JSON value. An entry that fails to decode is
    /// evicted and reported as a miss.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>> {
        let Some(data) = self.get(key).await? else {
            debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        match serde_json::from_str::<T>(&data) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache deserialization failed");
                if let Err(del_err) = self.del(key).await {
                    warn!(key = %key, error = %del_err, "Failed to evict corrupted cache entry");
                }
                Ok(None)
            }
        }
    }

    /// Encode a value as JSON and store it with TTL
    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let data = serde_json::to_string(value)?;
        self.set(key, &data, ttl).await
    }

    /// Delete every key matching a pattern, returning how many were removed
    async fn del_matching(&self, pattern: &str) -> CacheResult<usize> {
        let keys = self.keys_matching(pattern).await?;
        for key in &keys {
            self.del(key).await?;
        }
        debug!(pattern = %pattern, deleted = keys.len(), "Cache pattern delete");
        Ok(keys.len())
    }
}

impl<C: CacheStore + ?Sized> CacheStoreExt for C {}

/// Redis-backed cache
#[derive(Clone)]
pub struct RedisCache {
    redis: SharedRedis,
}

impl RedisCache {
    pub fn new(redis: SharedRedis) -> Self {
        Self { redis }
    }

    /// Open a connection manager for `redis_url`
    pub async fn connect(redis_url: &str) -> CacheResult<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.redis.lock().await;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Redis get error");
                Err(CacheError::Redis(e))
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.redis.lock().await;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(CacheError::Redis)?;

        debug!(key = %key, ttl = ttl_secs, "Cache set");
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        conn.del::<_, ()>(key).await.map_err(CacheError::Redis)?;

        debug!(key = %key, "Cache delete");
        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.redis.lock().await;
        let mut cursor: u64 = 0;
        let mut matched = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await
                .map_err(CacheError::Redis)?;

            matched.extend(keys);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once across iterations
        matched.sort();
        matched.dedup();

        debug!(pattern = %pattern, count = matched.len(), "Cache scan");
        Ok(matched)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        redis::cmd("PING")
            .query_async::<_, String>(&mut *conn)
            .await
            .map_err(CacheError::Redis)?;
        Ok(())
    }
}
