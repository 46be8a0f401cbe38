//! Search: query classification, the YouTube API client and result caching

pub mod query;
pub mod youtube;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::error::{AppError, AppResult};
use crate::core::rate_limiter::RateLimiter;
use crate::storage::cache::{CacheStats, SearchCache};
use query::{classify_query, QueryKind};
pub use youtube::{VideoLookup, YouTubeClient};

/// One selectable clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "videoId")]
    pub id: String,
    pub title: String,
}

/// Cache in front of the upstream lookups.
///
/// A cache hit never touches the rate limiter or the API. Failed lookups are
/// not cached.
pub struct SearchService {
    lookup: Arc<dyn VideoLookup>,
    cache: SearchCache,
}

impl SearchService {
    pub fn new(lookup: Arc<dyn VideoLookup>, cache: SearchCache) -> Self {
        Self { lookup, cache }
    }

    /// Real YouTube client with the configured limiter and cache.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let limiter = RateLimiter::new(config.requests_per_second, config.burst);
        let client = YouTubeClient::from_config(config, limiter)?;
        Ok(Self::new(
            Arc::new(client),
            SearchCache::new(config.cache_capacity, config.cache_ttl),
        ))
    }

    /// Resolves a keyword, video id or video link to a list of clips.
    ///
    /// A direct id that does not exist (or is too long) yields an empty list.
    pub async fn search(&self, query: &str) -> AppResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("query must not be empty".to_string()));
        }

        let fetch = async {
            match classify_query(query) {
                QueryKind::VideoId(id) => self
                    .lookup
                    .resolve_by_id(&id)
                    .await
                    .map(|found| found.into_iter().collect::<Vec<_>>()),
                QueryKind::Keyword(keyword) => self.lookup.search(&keyword).await,
            }
        };

        self.cache.get_or_fetch(query, fetch).await.map_err(AppError::Upstream)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
