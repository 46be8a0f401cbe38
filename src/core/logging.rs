//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Cookies configuration check
//! - yt-dlp availability check

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config::AppConfig;
use crate::download::ytdlp;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `verbose` - Log at debug level instead of info
pub fn init_logger(log_file_path: &str, verbose: bool) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs how yt-dlp will authenticate against YouTube.
pub fn log_cookies_configuration(config: &AppConfig) {
    match config.cookies_file.as_deref() {
        Some(path) if path.exists() => {
            let shown = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            log::info!("YTDL_COOKIES_FILE: {} (will be passed to yt-dlp)", shown.display());
        }
        Some(path) => {
            log::warn!(
                "YTDL_COOKIES_FILE: {} not found, downloading without cookies (cwd: {:?})",
                path.display(),
                std::env::current_dir()
            );
            log::warn!("Age-restricted or bot-checked videos will fail until a cookie file is exported");
        }
        None => log::info!("YTDL_COOKIES_FILE disabled, downloading without cookies"),
    }
}

/// Logs the download folder and the yt-dlp version found on PATH.
pub async fn log_startup_diagnostics(config: &AppConfig) {
    log::info!("Download folder: {}", config.download_folder.display());
    log::info!(
        "yt-dlp: bin={} max_concurrent={} timeout={:?}",
        config.ytdl_bin,
        config.max_concurrent_downloads,
        config.ytdlp_timeout
    );

    match ytdlp::tool_version(&config.ytdl_bin).await {
        Ok(version) => log::info!("yt-dlp version: {}", version),
        Err(e) => log::error!("yt-dlp is not usable: {}. Downloads will fail.", e),
    }

    if config.youtube_api_key.is_none() {
        log::warn!("YOUTUBE_API_KEY not set: keyword and link searches will be rejected");
    }

    log_cookies_configuration(config);
}

/// Whether a log file can be created at the given path.
pub fn log_path_writable(path: &Path) -> bool {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
        _ => true,
    }
}
