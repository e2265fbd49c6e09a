//! Response page cache.
//!
//! Process-local, keyed by request URL (path + query), bounded by a TTL and by
//! an entry limit. Nothing invalidates entries on writes: stale pages are
//! served until they expire or `invalidate`/`clear` is called.

use bytes::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::metrics::{record_cache_event, PAGE_CACHE_EVENTS};

/// Default lifetime of a cached page
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(20);

/// Default number of distinct URLs kept at once
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone)]
struct CachedEntry {
    data: Bytes,
    expires_at: Instant,
}

impl CachedEntry {
    #[inline]
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Rendered pages shared by every worker through `web::Data`
#[derive(Debug)]
pub struct PageCache {
    store: DashMap<String, CachedEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_TTL)
    }
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limits(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        debug!(
            ttl_secs = ttl.as_secs(),
            max_entries, "Initializing page cache"
        );
        Self {
            store: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`; expired entries are dropped on the way.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                record_cache_event("hit");
                debug!(key, "page cache HIT");
                return Some(entry.data.clone());
            }
        }

        self.store.remove_if(key, |_, entry| entry.is_expired());
        record_cache_event("miss");
        debug!(key, "page cache MISS");
        None
    }

    pub fn insert(&self, key: impl Into<String>, data: Bytes) {
        if self.ttl.is_zero() {
            return;
        }
        let key = key.into();
        if !self.store.contains_key(&key) {
            self.enforce_limits();
        }
        self.store.insert(
            key,
            CachedEntry {
                data,
                expires_at: Instant::now() + self.ttl,
            },
        );
        record_cache_event("insert");
    }

    /// Serve `key` from the cache or render it with `render` and store the
    /// result. Failed renders are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, render: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(data) = self.get(key) {
            return Ok(data);
        }

        let data = render().await?;
        self.insert(key, data.clone());
        Ok(data)
    }

    /// Make room for one more entry: sweep expired pages first, then drop
    /// the oldest tenth if the map is still full.
    fn enforce_limits(&self) {
        if self.store.len() < self.max_entries {
            return;
        }

        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let expired = before - self.store.len();

        let mut evicted = 0;
        if self.store.len() >= self.max_entries {
            let evict_count = (self.store.len() / 10).max(1);
            let mut oldest: Vec<(String, Instant)> = self
                .store
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().expires_at))
                .collect();
            oldest.sort_by_key(|(_, expires_at)| *expires_at);

            for (key, _) in oldest.into_iter().take(evict_count) {
                if self.store.remove(&key).is_some() {
                    evicted += 1;
                }
            }
            warn!(
                entries = self.store.len(),
                evicted, "Page cache full, evicted oldest entries"
            );
        }

        PAGE_CACHE_EVENTS
            .with_label_values(&["evict"])
            .inc_by((expired + evicted) as u64);
        debug!(expired, evicted, "page cache limits enforced");
    }

    /// Drop one page; true when something was removed
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.store.remove(key).is_some();
        if removed {
            record_cache_event("invalidate");
        }
        removed
    }

    pub fn clear(&self) {
        self.store.clear();
        record_cache_event("clear");
        debug!("page cache cleared");
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
