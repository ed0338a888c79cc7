//! Counter store abstraction backing the rate limiter.
//!
//! Two implementations: a Redis-backed store for production (counters are
//! shared across processes, increment is atomic in the store) and an
//! in-memory store for single-process deployments and tests. The in-memory
//! store is explicitly non-distributed; correctness degrades under
//! horizontal scale-out, and it logs a warning at construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

/// Counter store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store rejected or failed an operation
    #[error("counter store backend error: {0}")]
    Backend(String),

    /// The store could not be reached
    #[error("counter store connection error: {0}")]
    Connection(String),
}

/// Result of an atomic increment: the post-increment count and the time
/// remaining in the key's window.
#[derive(Debug, Clone, Copy)]
pub struct CounterSnapshot {
    /// Post-increment counter value
    pub count: u64,
    /// Time until the key expires
    pub ttl: Duration,
}

/// Atomic counter store reachable by every process of the service.
///
/// Keys are created on first increment and expire via the store's own TTL;
/// there is no explicit deletion path in normal operation.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the key, setting its expiry when freshly created.
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError>;

    /// Read the current counter value, if the key is live.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Delete the key outright.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Enumerate live keys matching a `prefix*` pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}

/// Redis-backed counter store for multi-process deployments.
pub struct RedisCounterStore {
    conn: Arc<RwLock<ConnectionManager>>,
}

impl RedisCounterStore {
    /// Connect to Redis at the given URL.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the URL is invalid or the initial
    /// connection cannot be established.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(RwLock::new(conn)),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let mut conn = self.conn.write().await;

        let count: u64 = conn
            .incr(key, 1u64)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Only the increment that created the key stamps the window; later
        // increments must not extend it.
        if count == 1 {
            let _: bool = conn
                .expire(key, window.as_secs().max(1) as i64)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        let ttl_ms: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let ttl = if ttl_ms > 0 {
            Duration::from_millis(ttl_ms as u64)
        } else {
            window
        };

        Ok(CounterSnapshot { count, ttl })
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.conn.write().await;
        conn.get(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.write().await;
        let _: u64 = conn
            .del(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.write().await;
        conn.keys(pattern)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u64,
    expires_at: Instant,
}

/// In-process counter store with manual expiry sweep.
///
/// Suitable for single-process deployments and tests only.
pub struct InMemoryCounterStore {
    buckets: RwLock<HashMap<String, WindowEntry>>,
}

impl InMemoryCounterStore {
    /// Create an empty store. Logs a warning: limits enforced through this
    /// store are per-process only.
    #[must_use]
    pub fn new() -> Self {
        warn!("in-memory counter store active; rate limits are per-process, not distributed");
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn pattern_matches(pattern: &str, key: &str) -> bool {
        match pattern.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == pattern,
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        buckets.retain(|_, entry| entry.expires_at > now);

        let entry = buckets.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            expires_at: now + window,
        });
        entry.count += 1;

        Ok(CounterSnapshot {
            count: entry.count,
            ttl: entry.expires_at.saturating_duration_since(now),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let buckets = self.buckets.read().await;
        let now = Instant::now();
        Ok(buckets
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.count))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        buckets.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let buckets = self.buckets.read().await;
        let now = Instant::now();
        Ok(buckets
            .iter()
            .filter(|(key, entry)| entry.expires_at > now && Self::pattern_matches(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
