//! Service facade shared by the HTTP server and the CLI

use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::error::{AppError, AppResult};
use crate::core::process::{CommandRunner, ProcessRunner};
use crate::download::{DownloadCoordinator, DownloadError, MediaFormat};
use crate::search::{SearchResult, SearchService};
use crate::storage::cache::CacheStats;
use crate::storage::cleanup::{FileLease, FileReaper};

/// Search and download, wired from one [`AppConfig`].
#[derive(Clone)]
pub struct MediaService {
    /// `None` when no API key is configured
    search: Option<Arc<SearchService>>,
    downloads: DownloadCoordinator,
    reaper: FileReaper,
}

impl MediaService {
    pub fn new(search: Option<SearchService>, downloads: DownloadCoordinator, reaper: FileReaper) -> Self {
        Self {
            search: search.map(Arc::new),
            downloads,
            reaper,
        }
    }

    /// Builds the production service: YouTube client plus real yt-dlp runner.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let search = match SearchService::from_config(config) {
            Ok(search) => Some(search),
            Err(AppError::Config(msg)) => {
                log::warn!("Search disabled: {}", msg);
                None
            }
            Err(e) => return Err(e),
        };

        let runner: Arc<dyn CommandRunner> =
            Arc::new(ProcessRunner::new(config.process_log_lines, config.ytdlp_timeout));
        Ok(Self::new(
            search,
            DownloadCoordinator::from_config(config, runner),
            FileReaper::new(config.cleanup_delay),
        ))
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<SearchResult>> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| AppError::Config("search requires YOUTUBE_API_KEY".to_string()))?;
        search.search(query).await
    }

    /// Downloads (or reuses) the file and leases it to the caller.
    ///
    /// The file stays on disk while the lease is alive and is removed after
    /// the grace delay once the last lease is dropped.
    pub async fn download(&self, video_id: &str, title: &str, format: &str) -> AppResult<FileLease> {
        let format = format.parse::<MediaFormat>().map_err(into_app_error)?;
        let file = self
            .downloads
            .download(video_id, title, format)
            .await
            .map_err(into_app_error)?;
        self.reaper.lease(&file)
    }

    pub fn downloads(&self) -> &DownloadCoordinator {
        &self.downloads
    }

    pub fn search_enabled(&self) -> bool {
        self.search.is_some()
    }

    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.search {
            Some(search) => Some(search.cache_stats().await),
            None => None,
        }
    }
}

fn into_app_error(err: DownloadError) -> AppError {
    match err {
        DownloadError::InvalidRequest(msg) => AppError::Validation(msg),
        other => AppError::Download(other),
    }
}
