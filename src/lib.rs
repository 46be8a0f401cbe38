//! tubefetch - search YouTube and download short clips through yt-dlp
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, rate limiting, subprocess execution, HTTP server
//! - `search`: query classification, YouTube Data API client, cached search service
//! - `download`: yt-dlp command lines and the deduplicating download coordinator
//! - `storage`: search result cache and delayed cleanup of served files
//! - `service`: facade used by the HTTP server and the CLI

pub mod cli;
pub mod core;
pub mod download;
pub mod search;
pub mod service;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::config::AppConfig;
pub use core::error::{AppError, AppResult};
pub use service::MediaService;
