//! Window cache
//!
//! Holds one fetch result per (region, month) window for a fixed TTL. The
//! cache is a volatile performance layer only: a restart empties it and
//! nothing depends on an entry surviving.
//!
//! Concurrency rules:
//! - the lock is never held across a fetch, so concurrent misses on the same
//!   window may both fetch (fetches are idempotent); the last write wins
//! - a failed fetch never touches the stored entry, stale or not
//! - stale entries are not evicted proactively, only overwritten

use chrono::{DateTime, Duration, Utc};
use remt_common::{Clock, PropertyAggregate, YearMonth};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ServiceError;
use crate::pipeline::WindowFetch;

/// Default entry lifetime in seconds
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// One (region, month) window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub region_code: String,
    pub year_month: YearMonth,
}

impl WindowKey {
    pub fn new(region_code: impl Into<String>, year_month: YearMonth) -> Self {
        Self {
            region_code: region_code.into(),
            year_month,
        }
    }

    /// `"{region}_{YYYYMM}"`
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.region_code, self.year_month)
    }
}

/// Cached result of one window fetch
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: WindowKey,
    pub aggregates: Arc<Vec<PropertyAggregate>>,
    pub total_raw_record_count: usize,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn from_fetch(key: WindowKey, fetch: WindowFetch, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key,
            aggregates: Arc::new(fetch.aggregates),
            total_raw_record_count: fetch.total_raw_record_count,
            fetched_at,
        }
    }
}

/// TTL cache of window fetch results
pub struct WindowCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl WindowCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached entry for `key` if still fresh, else the result of `fetch`
    ///
    /// On fetch failure the error is returned and the cache is left as it
    /// was.
    pub async fn get_or_fetch<F, Fut>(&self, key: &WindowKey, fetch: F) -> Result<CacheEntry, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WindowFetch, ServiceError>>,
    {
        let cache_key = key.cache_key();

        if let Some(entry) = self.fresh(&cache_key).await {
            debug!(window = %cache_key, "Window cache hit");
            return Ok(entry);
        }

        debug!(window = %cache_key, "Window cache miss, fetching");
        let fetched = fetch().await?;
        let entry = CacheEntry::from_fetch(key.clone(), fetched, self.clock.now());

        self.entries.write().await.insert(cache_key, entry.clone());
        Ok(entry)
    }

    /// Fresh entry for a cache key, ignoring stale ones
    async fn fresh(&self, cache_key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        let entry = entries.get(cache_key)?;
        self.is_fresh(entry).then(|| entry.clone())
    }

    /// Entry for `key` regardless of age
    pub async fn peek(&self, key: &WindowKey) -> Option<CacheEntry> {
        self.entries.read().await.get(&key.cache_key()).cloned()
    }

    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now() - entry.fetched_at < self.ttl
    }

    /// Number of stored entries, stale ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
