use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Search configuration defaults
pub mod search {
    /// YouTube Data API v3 root
    pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

    /// Steady upstream request rate
    pub const REQUESTS_PER_SECOND: f64 = 10.0;

    /// Token bucket capacity (1 = no bursts)
    pub const BURST: u32 = 1;

    /// Candidates requested from the search endpoint
    pub const MAX_RESULTS: u32 = 10;

    /// Longest clip offered to callers (15 minutes)
    pub const MAX_DURATION_SECS: u64 = 900;

    /// Maximum number of cached queries
    pub const CACHE_CAPACITY: u64 = 1000;

    /// Lifetime of a cached query
    pub const CACHE_TTL_SECS: u64 = 60 * 60;

    /// Timeout for a single API call
    pub const HTTP_TIMEOUT_SECS: u64 = 15;
}

/// Download configuration defaults
pub mod download {
    /// yt-dlp binary
    pub const YTDL_BIN: &str = "yt-dlp";

    /// Cookie file passed to yt-dlp when present
    pub const COOKIES_FILE: &str = "cookies/cookies.txt";

    /// Height cap for mp4 downloads
    pub const MAX_VIDEO_HEIGHT: u32 = 1080;

    /// Maximum number of yt-dlp processes running at once
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 2;

    /// Timeout for yt-dlp commands (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 240;

    /// Lines of yt-dlp output kept for diagnostics
    pub const PROCESS_LOG_LINES: usize = 30;

    /// Delay before a served file is deleted (in seconds)
    pub const FILE_CLEANUP_DELAY_SECS: u64 = 10;
}

/// Web server defaults
pub mod web {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8080;
}

/// Log file path default
pub const LOG_FILE_PATH: &str = "tubefetch.log";

/// Runtime configuration, read once at startup.
///
/// Values come from the process environment (after `.env` has been loaded by
/// the binary). Every key has a default except the API key, which is only
/// required once a search actually hits the upstream API.
#[derive(Debug)]
pub struct AppConfig {
    pub youtube_api_key: Option<SecretString>,
    pub api_base_url: String,
    pub requests_per_second: f64,
    pub burst: u32,
    pub cache_capacity: u64,
    pub cache_ttl: Duration,
    pub max_duration_secs: u64,
    pub http_timeout: Duration,
    pub download_folder: PathBuf,
    pub ytdl_bin: String,
    pub cookies_file: Option<PathBuf>,
    pub max_video_height: u32,
    pub max_concurrent_downloads: usize,
    /// `None` disables the deadline
    pub ytdlp_timeout: Option<Duration>,
    pub process_log_lines: usize,
    pub cleanup_delay: Duration,
    pub web_host: String,
    pub web_port: u16,
    pub log_file_path: String,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_var_string)
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let download_folder = lookup("DOWNLOAD_FOLDER")
            .map(|raw| PathBuf::from(shellexpand::tilde(&raw).into_owned()))
            .unwrap_or_else(|| env::temp_dir().join("downloads"));

        // `-` disables cookies altogether
        let cookies_file = match lookup("YTDL_COOKIES_FILE") {
            Some(raw) if raw == "-" => None,
            Some(raw) => Some(PathBuf::from(shellexpand::tilde(&raw).into_owned())),
            None => Some(PathBuf::from(download::COOKIES_FILE)),
        };

        let ytdlp_timeout = match parse_or("YTDLP_TIMEOUT_SECS", &lookup, download::YTDLP_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            youtube_api_key: lookup("YOUTUBE_API_KEY").map(SecretString::from),
            api_base_url: lookup("YOUTUBE_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| search::API_BASE_URL.to_string()),
            requests_per_second: parse_or("SEARCH_RATE_PER_SEC", &lookup, search::REQUESTS_PER_SECOND),
            burst: parse_or("SEARCH_BURST", &lookup, search::BURST).max(1),
            cache_capacity: parse_or("SEARCH_CACHE_CAPACITY", &lookup, search::CACHE_CAPACITY),
            cache_ttl: Duration::from_secs(parse_or(
                "SEARCH_CACHE_TTL_SECS",
                &lookup,
                search::CACHE_TTL_SECS,
            )),
            max_duration_secs: parse_or("MAX_DURATION_SECS", &lookup, search::MAX_DURATION_SECS),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", &lookup, search::HTTP_TIMEOUT_SECS)),
            download_folder,
            ytdl_bin: lookup("YTDL_BIN").unwrap_or_else(|| download::YTDL_BIN.to_string()),
            cookies_file,
            max_video_height: parse_or("MAX_VIDEO_HEIGHT", &lookup, download::MAX_VIDEO_HEIGHT),
            max_concurrent_downloads: parse_or(
                "MAX_CONCURRENT_DOWNLOADS",
                &lookup,
                download::MAX_CONCURRENT_DOWNLOADS,
            )
            .max(1),
            ytdlp_timeout,
            process_log_lines: parse_or("PROCESS_LOG_LINES", &lookup, download::PROCESS_LOG_LINES),
            cleanup_delay: Duration::from_secs(parse_or(
                "FILE_CLEANUP_DELAY_SECS",
                &lookup,
                download::FILE_CLEANUP_DELAY_SECS,
            )),
            web_host: lookup("WEB_HOST").unwrap_or_else(|| web::HOST.to_string()),
            web_port: parse_or("WEB_PORT", &lookup, web::PORT),
            log_file_path: lookup("LOG_FILE_PATH").unwrap_or_else(|| LOG_FILE_PATH.to_string()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid {}={:?}, using default {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.youtube_api_key.is_none());
        assert_eq!(config.api_base_url, search::API_BASE_URL);
        assert_eq!(config.requests_per_second, 10.0);
        assert_eq!(config.max_duration_secs, 900);
        assert_eq!(config.ytdl_bin, "yt-dlp");
        assert_eq!(config.cookies_file, Some(PathBuf::from("cookies/cookies.txt")));
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.ytdlp_timeout, Some(Duration::from_secs(240)));
        assert_eq!(config.process_log_lines, 30);
        assert_eq!(config.cleanup_delay, Duration::from_secs(10));
        assert_eq!(config.download_folder, env::temp_dir().join("downloads"));
    }

    #[test]
    fn test_reads_values() {
        let config = config_from(&[
            ("YOUTUBE_API_KEY", "secret"),
            ("YOUTUBE_API_BASE_URL", "http://127.0.0.1:9000/"),
            ("SEARCH_RATE_PER_SEC", "2.5"),
            ("DOWNLOAD_FOLDER", "/srv/media"),
            ("MAX_CONCURRENT_DOWNLOADS", "4"),
            ("WEB_PORT", "9090"),
        ]);
        assert_eq!(
            config.youtube_api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("secret".to_string())
        );
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.requests_per_second, 2.5);
        assert_eq!(config.download_folder, PathBuf::from("/srv/media"));
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.web_port, 9090);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[("WEB_PORT", "nope"), ("PROCESS_LOG_LINES", "-3")]);
        assert_eq!(config.web_port, web::PORT);
        assert_eq!(config.process_log_lines, download::PROCESS_LOG_LINES);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = config_from(&[("YTDLP_TIMEOUT_SECS", "0")]);
        assert_eq!(config.ytdlp_timeout, None);
    }

    #[test]
    fn test_dash_disables_cookies() {
        let config = config_from(&[("YTDL_COOKIES_FILE", "-")]);
        assert_eq!(config.cookies_file, None);
    }

    #[test]
    fn test_concurrency_floor() {
        let config = config_from(&[("MAX_CONCURRENT_DOWNLOADS", "0")]);
        assert_eq!(config.max_concurrent_downloads, 1);
    }
}
