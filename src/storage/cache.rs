use moka::future::Cache;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::search::SearchResult;

/// Memoizes `query -> results` for the search path.
///
/// Keys are the raw query strings, without normalization. Capacity is
/// bounded (least recently used entries go first) and every entry expires
/// after the configured time-to-live. Concurrent lookups of the same key
/// share one fetch.
#[derive(Clone)]
pub struct SearchCache {
    cache: Cache<String, Arc<Vec<SearchResult>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl SearchCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the cached results for `query`, or runs `fetch` to fill the
    /// entry.
    ///
    /// Callers arriving while a fetch for the same query is running wait for
    /// it instead of starting their own, and count as hits. A failed fetch is
    /// not stored; every waiter gets the same shared error.
    pub async fn get_or_fetch<F, E>(&self, query: &str, fetch: F) -> Result<Vec<SearchResult>, Arc<E>>
    where
        F: Future<Output = Result<Vec<SearchResult>, E>>,
        E: Send + Sync + 'static,
    {
        let entry = self
            .cache
            .entry(query.to_string())
            .or_try_insert_with(async move { fetch.await.map(Arc::new) })
            .await;

        match entry {
            Ok(entry) if entry.is_fresh() => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(entry.into_value().as_ref().clone())
            }
            Ok(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Search cache hit for {:?}", query);
                Ok(entry.into_value().as_ref().clone())
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            size: self.cache.entry_count(),
            hits,
            misses,
            hit_rate,
        }
    }
}

/// Search cache counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: u64,
    pub hits: u64,
    pub misses: u64,
    /// Percentage, 0 when nothing was looked up yet
    pub hit_rate: f64,
}
