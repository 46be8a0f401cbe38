//! Download management: yt-dlp command lines and per-(id, format) task deduplication

pub mod coordinator;
pub mod error;
pub mod ytdlp;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use coordinator::{DownloadCoordinator, DownloadHandle, TaskState};
pub use error::DownloadError;

/// Output container requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFormat {
    Mp3,
    Mp4,
}

impl MediaFormat {
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Mp4 => "video/mp4",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = DownloadError;

    /// Case-insensitive; anything but mp3/mp4 is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            other => Err(DownloadError::InvalidRequest(format!(
                "unsupported format {:?}, expected mp3 or mp4",
                other
            ))),
        }
    }
}

/// Identity of a download task. At most one task per key runs at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadKey {
    pub video_id: String,
    pub format: MediaFormat,
}

impl DownloadKey {
    pub fn new(video_id: impl Into<String>, format: MediaFormat) -> Self {
        Self {
            video_id: video_id.into(),
            format,
        }
    }
}

impl fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.video_id, self.format)
    }
}

/// A finished file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFile {
    pub path: PathBuf,
    pub size: u64,
}

impl ResultFile {
    /// Final path component, or an empty string for odd paths.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
