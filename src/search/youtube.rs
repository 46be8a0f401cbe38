//! YouTube Data API v3 client
//!
//! Two calls are used: `search` for keyword lookups and `videos` for
//! metadata (title and duration). Every outbound request passes through the
//! shared [`RateLimiter`]. Failures are reported as [`UpstreamError`] and
//! never retried.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use crate::core::config::{self, AppConfig};
use crate::core::error::{AppError, UpstreamError};
use crate::core::rate_limiter::RateLimiter;
use crate::search::SearchResult;

/// Upstream lookups used by [`crate::search::SearchService`].
#[async_trait]
pub trait VideoLookup: Send + Sync {
    /// Metadata for one video. `None` if it does not exist or is too long.
    async fn resolve_by_id(&self, video_id: &str) -> Result<Option<SearchResult>, UpstreamError>;

    /// Keyword search, in upstream ranking order, long videos removed.
    async fn search(&self, keyword: &str) -> Result<Vec<SearchResult>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Option<Snippet>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

impl VideoItem {
    fn duration_secs(&self) -> Option<u64> {
        let raw = self.content_details.as_ref()?.duration.as_deref()?;
        match parse_iso8601_duration(raw) {
            Ok(secs) => Some(secs),
            Err(e) => {
                log::warn!("Skipping {}: {}", self.id, e);
                None
            }
        }
    }
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("duration regex")
});

/// Parses an ISO-8601 duration such as `PT4M13S` or `P1DT2H` into seconds.
pub fn parse_iso8601_duration(raw: &str) -> Result<u64, UpstreamError> {
    let invalid = || UpstreamError::Duration(raw.to_string());
    if raw == "P" || raw.ends_with('T') {
        return Err(invalid());
    }
    let caps = DURATION_RE.captures(raw).ok_or_else(invalid)?;

    let mut total: u64 = 0;
    for (group, unit) in [(1, 7 * 86_400), (2, 86_400), (3, 3_600), (4, 60), (5, 1)] {
        if let Some(m) = caps.get(group) {
            let value: u64 = m.as_str().parse().map_err(|_| invalid())?;
            total = value
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(invalid)?;
        }
    }
    Ok(total)
}

/// The API returns HTML-escaped titles in search snippets.
fn decode_html_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    limiter: RateLimiter,
    max_duration_secs: u64,
}

impl YouTubeClient {
    /// Builds a client from configuration. Fails without an API key.
    pub fn from_config(config: &AppConfig, limiter: RateLimiter) -> Result<Self, AppError> {
        let api_key = config
            .youtube_api_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_string()))
            .ok_or_else(|| AppError::Config("YOUTUBE_API_KEY is not set".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("tubefetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            limiter,
            max_duration_secs: config.max_duration_secs,
        })
    }

    fn within_limit(&self, secs: u64) -> bool {
        // P0D is what the API reports for live and upcoming streams
        secs > 0 && secs <= self.max_duration_secs
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", self.api_key.expose_secret());

        self.limiter.acquire().await;
        log::debug!("YouTube API: GET /{} {:?}", endpoint, params);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| UpstreamError::Http { endpoint, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| UpstreamError::Http { endpoint, source })?;

        if !status.is_success() {
            let body: String = body.chars().take(500).collect();
            return Err(UpstreamError::Status { endpoint, status, body });
        }

        serde_json::from_str(&body).map_err(|source| UpstreamError::Parse { endpoint, source })
    }
}

#[async_trait]
impl VideoLookup for YouTubeClient {
    async fn resolve_by_id(&self, video_id: &str) -> Result<Option<SearchResult>, UpstreamError> {
        let response: VideosResponse = self
            .get_json("videos", &[("part", "snippet,contentDetails"), ("id", video_id)])
            .await?;

        let Some(item) = response.items.into_iter().next() else {
            log::info!("Video {} not found upstream", video_id);
            return Ok(None);
        };

        match item.duration_secs() {
            Some(secs) if self.within_limit(secs) => Ok(Some(SearchResult {
                title: item
                    .snippet
                    .map(|s| decode_html_entities(&s.title))
                    .unwrap_or_default(),
                id: item.id,
            })),
            secs => {
                log::info!("Video {} rejected, duration {:?}s", video_id, secs);
                Ok(None)
            }
        }
    }

    async fn search(&self, keyword: &str) -> Result<Vec<SearchResult>, UpstreamError> {
        let max_results = config::search::MAX_RESULTS.to_string();
        let response: SearchResponse = self
            .get_json(
                "search",
                &[("part", "snippet"), ("q", keyword), ("type", "video"), ("maxResults", max_results.as_str())],
            )
            .await?;

        let candidates: Vec<(String, String)> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let title = item.snippet.map(|s| s.title).unwrap_or_default();
                Some((item.id.video_id?, title))
            })
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids = candidates.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>().join(",");
        let details: VideosResponse = self
            .get_json("videos", &[("part", "contentDetails"), ("id", ids.as_str())])
            .await?;
        let durations: HashMap<String, u64> = details
            .items
            .iter()
            .filter_map(|item| Some((item.id.clone(), item.duration_secs()?)))
            .collect();

        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|(id, _)| durations.get(id).is_some_and(|&secs| self.within_limit(secs)))
            .map(|(id, title)| SearchResult {
                id,
                title: decode_html_entities(&title),
            })
            .collect();
        log::info!("Search {:?}: {} of {} candidates kept", keyword, results.len(), durations.len());
        Ok(results)
    }
}
