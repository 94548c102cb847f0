use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Progressive MP4 with muxed audio (yt-dlp format id 18). A fixed format
/// identifier keeps the downloaded file stable across runs, which is what
/// the download cache keys on.
const FORMAT_ID: &str = "18";

/// Video metadata as reported by the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub thumbnail: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Publish date as `YYYYMMDD`.
    pub upload_date: Option<String>,
}

/// Validate that a string looks like a URL.
/// Rejects anything that isn't http:// or https://.
fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::UnrecognizedUrl(trimmed.to_string()))
    }
}

async fn ensure_yt_dlp() -> Result<()> {
    let check = tokio::process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await;
    if check.is_err() {
        return Err(Error::YtDlpNotFound);
    }
    Ok(())
}

/// Resolve video metadata for a URL without downloading anything.
///
/// A URL the source does not recognize is a distinct, non-retried failure.
pub async fn fetch_info(url: &str) -> Result<VideoInfo> {
    validate_url(url)?;
    ensure_yt_dlp().await?;

    let output = tokio::process::Command::new("yt-dlp")
        .args(["--dump-json", "--no-download", "--no-playlist", "--no-exec"])
        .arg(url)
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::UnrecognizedUrl(url.trim().to_string()));
    }

    let info: VideoInfo = serde_json::from_slice(&output.stdout)?;
    debug!(title = ?info.title, uploader = ?info.uploader, "resolved video metadata");
    Ok(info)
}

/// Download the video stream selected by [`FORMAT_ID`] into `output_dir`,
/// named after the source's title.
///
/// # Security
/// - URL is validated to start with http:// or https://
/// - Arguments are passed to yt-dlp via `.arg()` (no shell expansion)
/// - `--no-exec` prevents yt-dlp from running post-processing commands
/// - Downloaded file path is validated to be inside output_dir
pub async fn download_video(url: &str, output_dir: &Path) -> Result<PathBuf> {
    validate_url(url)?;
    ensure_yt_dlp().await?;

    info!(%url, "downloading video");
    std::fs::create_dir_all(output_dir)?;

    let output_template = output_dir
        .join("%(title)s.%(ext)s")
        .to_str()
        .ok_or_else(|| Error::Download("output directory path contains invalid UTF-8".into()))?
        .to_string();

    let output = tokio::process::Command::new("yt-dlp")
        .args([
            "-f",
            FORMAT_ID,
            "--no-playlist",
            "--no-exec",
            "--output",
            &output_template,
            "--print",
            "after_move:filepath",
        ])
        .arg(url)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Limit error message length to avoid dumping huge stderr
        let stderr_truncated: String = stderr.chars().take(1000).collect();
        return Err(Error::Download(format!("yt-dlp failed: {stderr_truncated}")));
    }

    let video_path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();

    // yt-dlp --print after_move:filepath gives us the final path
    let video_path = if video_path_str.is_empty() {
        // Fallback: find the file in output_dir
        find_video_file(output_dir)?
    } else {
        let candidate = PathBuf::from(&video_path_str);
        validate_path_in_dir(&candidate, output_dir)?;
        candidate
    };

    if !video_path.exists() {
        return Err(Error::Download(format!(
            "downloaded file not found at {}",
            video_path.display()
        )));
    }

    debug!(path = %video_path.display(), "video downloaded");
    Ok(video_path)
}

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir => {}
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Validate that a path is inside the expected directory (prevents path traversal).
fn validate_path_in_dir(path: &Path, expected_dir: &Path) -> Result<()> {
    // Try filesystem canonicalization first (most reliable when paths exist)
    let canonical_dir = expected_dir
        .canonicalize()
        .unwrap_or_else(|_| normalize_path(expected_dir));
    let canonical_path = path.canonicalize().unwrap_or_else(|_| normalize_path(path));

    if canonical_path.starts_with(&canonical_dir) {
        Ok(())
    } else {
        warn!(
            path = %path.display(),
            expected_dir = %expected_dir.display(),
            "downloaded file path outside expected directory"
        );
        Err(Error::Download(
            "downloaded file path is outside the expected output directory".into(),
        ))
    }
}

/// Find the most recently modified video file in a directory.
fn find_video_file(dir: &Path) -> Result<PathBuf> {
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if matches!(ext, "mp4" | "webm" | "mkv" | "mov" | "avi") {
                if let Ok(meta) = entry.metadata() {
                    if let Ok(modified) = meta.modified() {
                        if best.as_ref().is_none_or(|(_, t)| modified > *t) {
                            best = Some((path, modified));
                        }
                    }
                }
            }
        }
    }

    best.map(|(p, _)| p)
        .ok_or_else(|| Error::Download("no video file found after download".into()))
}
