use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::core::config::AppConfig;
use crate::core::process::run_with_timeout;
use crate::download::error::DownloadError;
use crate::download::MediaFormat;

/// How long `yt-dlp --version` may take before we give up
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Canonical watch URL handed to yt-dlp.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Returns the version string printed by `<bin> --version`.
pub async fn tool_version(ytdl_bin: &str) -> Result<String, DownloadError> {
    let output = run_with_timeout(Command::new(ytdl_bin).arg("--version"), VERSION_CHECK_TIMEOUT).await?;
    if !output.status.success() {
        return Err(DownloadError::ExtractionFailed {
            exit_code: output.status.code(),
            output: String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string)
                .collect(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Fixed parts of every yt-dlp command line.
#[derive(Debug, Clone)]
pub struct YtdlpTemplate {
    pub bin: String,
    pub cookies_file: Option<PathBuf>,
    pub max_video_height: u32,
}

impl YtdlpTemplate {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bin: config.ytdl_bin.clone(),
            cookies_file: config.cookies_file.clone(),
            max_video_height: config.max_video_height,
        }
    }

    /// Format selector for `-f`.
    pub fn format_selector(&self, format: MediaFormat) -> String {
        match format {
            MediaFormat::Mp3 => "bestaudio".to_string(),
            MediaFormat::Mp4 => format!(
                "bestvideo[height<={}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]",
                self.max_video_height
            ),
        }
    }

    /// Builds the full argument vector, program first.
    ///
    /// Output goes to `<folder>/<stem>.<ext>`. The cookie file is only passed
    /// when it exists right now.
    pub fn build(&self, video_id: &str, format: MediaFormat, folder: &Path, stem: &str) -> Vec<String> {
        let mut args = vec![
            self.bin.clone(),
            "--no-playlist".to_string(),
            "--force-overwrites".to_string(),
        ];

        if let Some(cookies) = self.cookies_file.as_deref().filter(|path| path.exists()) {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }

        args.push("-f".to_string());
        args.push(self.format_selector(format));

        match format {
            MediaFormat::Mp3 => {
                args.extend(["--extract-audio", "--audio-format", "mp3"].map(String::from));
            }
            MediaFormat::Mp4 => {
                args.extend(["--merge-output-format", "mp4"].map(String::from));
            }
        }

        args.push("-o".to_string());
        args.push(expected_output(folder, stem, format).to_string_lossy().into_owned());
        args.push(watch_url(video_id));
        args
    }
}

/// Where yt-dlp is expected to leave the finished file.
pub fn expected_output(folder: &Path, stem: &str, format: MediaFormat) -> PathBuf {
    folder.join(format!("{}.{}", stem, format.extension()))
}
