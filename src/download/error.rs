use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Structured error type for download operations.
///
/// One outcome is delivered to every requester waiting on the same task, so
/// the type is `Clone`; underlying IO causes are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// yt-dlp could not be started, or the output directory could not be created
    #[error("{message}")]
    Launch {
        message: String,
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// yt-dlp ran but reported failure
    #[error("yt-dlp failed with {}", describe_exit(.exit_code))]
    ExtractionFailed {
        exit_code: Option<i32>,
        /// First lines of merged stdout/stderr, for diagnostics
        output: Vec<String>,
    },

    /// yt-dlp reported success but no output file could be located
    #[error("download finished but file not found: {0}")]
    FileNotFound(String),

    /// The subprocess exceeded its deadline and was killed
    #[error("yt-dlp timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Filesystem failure while inspecting the output directory
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The worker running the task died before publishing an outcome
    #[error("download task aborted: {0}")]
    Aborted(String),

    /// Request rejected before any task was registered
    #[error("{0}")]
    InvalidRequest(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

impl DownloadError {
    pub fn launch(message: impl Into<String>, source: io::Error) -> Self {
        DownloadError::Launch {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        DownloadError::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Returns subcategory for logs and HTTP error bodies
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Launch { .. } => "launch",
            DownloadError::ExtractionFailed { .. } => "extraction",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Timeout { .. } => "timeout",
            DownloadError::Io { .. } => "io",
            DownloadError::Aborted(_) => "aborted",
            DownloadError::InvalidRequest(_) => "validation",
        }
    }

    /// Captured tool output attached to the failure, if any.
    pub fn output(&self) -> &[String] {
        match self {
            DownloadError::ExtractionFailed { output, .. } => output,
            _ => &[],
        }
    }
}
