use std::sync::Arc;
use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error type for the service surface.
///
/// Every failure a caller of [`crate::service::MediaService`] can observe is
/// one of these variants. Uses `thiserror` for conversion and display.
///
/// # Example
///
/// ```no_run
/// use tubefetch::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Talking to the search API failed. Shared, since concurrent callers
    /// of one cached lookup all receive the same failure.
    #[error("Upstream error: {0}")]
    Upstream(#[from] Arc<UpstreamError>),

    /// Download/yt-dlp errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// The requested item or file does not exist (anymore)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

/// Failures while talking to the YouTube Data API.
///
/// Always carries the original cause; the client never retries.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response body was not the JSON shape we expect
    #[error("malformed {endpoint} response: {source}")]
    Parse {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A duration field that is not ISO-8601
    #[error("invalid duration {0:?}")]
    Duration(String),

    /// The request URL could not be built
    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        AppError::Upstream(Arc::new(err))
    }
}

impl AppError {
    /// Short machine-readable category, used in logs and HTTP bodies.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Upstream(_) => "upstream",
            AppError::Download(err) => err.subcategory(),
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
        }
    }
}
