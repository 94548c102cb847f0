//! YouTube transcription pipeline: URL in, Whisper transcript out in five
//! formats (plain text, markdown timestamp table, JSON, raw JSON with model
//! diagnostics, SubRip subtitles), with a flat-file cache of downloads
//! keyed by source URL.
//!
//! Downloading, audio extraction and speech recognition are delegated to
//! yt-dlp, ffmpeg and whisper.cpp; this crate sequences them and owns the
//! cache and output formatting.
//!
//! Runs are synchronous in spirit: each stage blocks to completion before
//! the next starts. The cache file has no cross-process coordination, so
//! parallel runs sharing one cache can lose updates to each other.

pub mod audio;
pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod model;
pub mod pipeline;
pub mod transcribe;
pub mod types;

pub use cache::CacheFile;
pub use config::{Language, Model, TranscribeOptions};
pub use download::VideoInfo;
pub use error::{Error, Result};
pub use pipeline::{OutputPaths, PipelineOptions, PipelineOutput};
pub use types::{Segment, Transcript};

/// Run the full pipeline for a URL with default options.
pub async fn transcribe_url(url: &str) -> Result<PipelineOutput> {
    pipeline::run(url, &PipelineOptions::default()).await
}

/// Run the full pipeline for a URL with custom options.
pub async fn transcribe_url_with_options(
    url: &str,
    options: &PipelineOptions,
) -> Result<PipelineOutput> {
    pipeline::run(url, options).await
}
