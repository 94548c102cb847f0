//! Sequences one transcription request end to end: cache check, download,
//! audio extraction, transcription, formatting, output files.
//!
//! Every stage runs to completion before the next starts and any stage
//! failure aborts the request with the underlying cause; nothing is retried
//! here. The one exception is the cache: if its file cannot be read or
//! written the run logs a warning and proceeds as if uncached.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::audio;
use crate::cache::CacheFile;
use crate::config::TranscribeOptions;
use crate::download::{self, VideoInfo};
use crate::error::Result;
use crate::model;
use crate::transcribe;
use crate::types::Transcript;

fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("tubescribe")
}

/// Options for a pipeline run.
pub struct PipelineOptions {
    /// Timestamped per-run output directories are created under this root.
    pub output_root: PathBuf,
    /// Flat-file download cache location.
    pub cache_file: PathBuf,
    /// Where downloaded videos land. They back the cache entries, so this
    /// should be somewhere that survives between runs.
    pub download_dir: PathBuf,
    /// Scratch space for the extracted audio.
    pub work_dir: PathBuf,
    /// Keep the extracted audio file instead of deleting it at the end.
    pub keep_intermediates: bool,
    /// Also delete the downloaded video at the end. The matching cache
    /// entry expires on the next scan.
    pub discard_video: bool,
    pub transcribe: TranscribeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            output_root: PathBuf::from("transcripts"),
            cache_file: data_dir.join("downloads.tsv"),
            download_dir: data_dir.join("media"),
            work_dir: std::env::temp_dir().join("tubescribe"),
            keep_intermediates: false,
            discard_video: false,
            transcribe: TranscribeOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_root(mut self, dir: PathBuf) -> Self {
        self.output_root = dir;
        self
    }

    pub fn cache_file(mut self, path: PathBuf) -> Self {
        self.cache_file = path;
        self
    }

    pub fn download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = dir;
        self
    }

    pub fn work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = dir;
        self
    }

    pub fn keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    pub fn discard_video(mut self, discard: bool) -> Self {
        self.discard_video = discard;
        self
    }

    pub fn transcribe(mut self, opts: TranscribeOptions) -> Self {
        self.transcribe = opts;
        self
    }
}

/// Where one run's five output files were written.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub txt: PathBuf,
    pub md: PathBuf,
    pub json: PathBuf,
    pub json_raw: PathBuf,
    pub srt: PathBuf,
}

impl OutputPaths {
    /// Derive the five output paths for a media basename under `dir`.
    fn new(dir: &Path, basename: &str) -> Self {
        Self {
            txt: dir.join(format!("{basename}.txt")),
            md: dir.join(format!("{basename}.md")),
            json: dir.join(format!("{basename}.json")),
            json_raw: dir.join(format!("{basename}_raw.json")),
            srt: dir.join(format!("{basename}.srt")),
        }
    }
}

/// Result of a full pipeline run.
pub struct PipelineOutput {
    pub transcript: Transcript,
    /// Metadata from the source; None when the download came from cache.
    pub info: Option<VideoInfo>,
    pub video_path: PathBuf,
    pub from_cache: bool,
    pub output_dir: PathBuf,
    pub files: OutputPaths,
}

/// Run the whole pipeline for one URL.
pub async fn run(url: &str, opts: &PipelineOptions) -> Result<PipelineOutput> {
    let cache = CacheFile::new(&opts.cache_file);
    if let Err(e) = cache.initialize_or_prune() {
        warn!(error = %e, "cache unavailable, continuing without it");
    }

    let cached = match cache.lookup(url) {
        Ok(hit) => hit,
        Err(e) => {
            warn!(error = %e, "cache lookup failed, treating as miss");
            None
        }
    };

    let from_cache = cached.is_some();
    let mut info = None;

    let video_path = match cached {
        Some(path) => {
            info!(path = %path.display(), "reusing cached download");
            path
        }
        None => {
            info = Some(download::fetch_info(url).await?);
            let path = download::download_video(url, &opts.download_dir).await?;
            if let Err(e) = cache.record(url, &path) {
                warn!(error = %e, "failed to record download in cache");
            }
            path
        }
    };

    let basename = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript".to_string());

    std::fs::create_dir_all(&opts.work_dir)?;
    let audio_path = opts.work_dir.join(format!("{basename}.wav"));
    audio::extract_audio(&video_path, &audio_path).await?;

    let model_dir = opts.transcribe.resolve_model_dir();
    let model_path = model::ensure_model(&opts.transcribe.model, &model_dir).await?;

    let samples = audio::load_samples(&audio_path)?;
    let mut transcript = transcribe::transcribe_samples(&samples, &model_path, &opts.transcribe)?;
    transcript.trim_whitespace();
    transcript.source_url = Some(url.to_string());
    transcript.source_title = info.as_ref().and_then(|i| i.title.clone());

    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let output_dir = opts.output_root.join(stamp);
    let files = write_outputs(&transcript, &output_dir, &basename)?;
    info!(dir = %output_dir.display(), "transcript written");

    if !opts.keep_intermediates {
        remove_best_effort(&audio_path);
    }
    if opts.discard_video {
        remove_best_effort(&video_path);
    }

    Ok(PipelineOutput {
        transcript,
        info,
        video_path,
        from_cache,
        output_dir,
        files,
    })
}

/// Derive all five representations and write them under `dir`.
fn write_outputs(transcript: &Transcript, dir: &Path, basename: &str) -> Result<OutputPaths> {
    std::fs::create_dir_all(dir)?;
    let files = OutputPaths::new(dir, basename);

    std::fs::write(&files.txt, &transcript.text)?;
    std::fs::write(&files.md, transcript.to_markdown_table())?;
    std::fs::write(&files.json, transcript.to_json()?)?;
    std::fs::write(&files.json_raw, transcript.to_json_raw()?)?;
    std::fs::write(&files.srt, transcript.to_srt())?;

    Ok(files)
}

/// Best-effort removal of an intermediate file. Failure is logged, never
/// fatal to the request.
fn remove_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "couldn't remove intermediate file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn sample_transcript() -> Transcript {
        Transcript {
            text: "hello".to_string(),
            segments: vec![Segment {
                id: 0,
                start: 0.0,
                end: 1.5,
                text: "hello".to_string(),
                seek: 0,
                temperature: 0.0,
                avg_logprob: -0.1,
                compression_ratio: 1.0,
                no_speech_prob: 0.0,
            }],
            language: "en".to_string(),
            duration: 1.5,
            model: "base".to_string(),
            source_url: None,
            source_title: None,
        }
    }

    #[test]
    fn output_paths_follow_naming_scheme() {
        let files = OutputPaths::new(Path::new("/out/2024-01-02_03-04-05"), "My Video");
        assert_eq!(files.txt, Path::new("/out/2024-01-02_03-04-05/My Video.txt"));
        assert_eq!(files.md, Path::new("/out/2024-01-02_03-04-05/My Video.md"));
        assert_eq!(files.json, Path::new("/out/2024-01-02_03-04-05/My Video.json"));
        assert_eq!(
            files.json_raw,
            Path::new("/out/2024-01-02_03-04-05/My Video_raw.json")
        );
        assert_eq!(files.srt, Path::new("/out/2024-01-02_03-04-05/My Video.srt"));
    }

    #[test]
    fn write_outputs_creates_all_five_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("run");
        let files = write_outputs(&sample_transcript(), &out_dir, "clip").unwrap();

        for path in [&files.txt, &files.md, &files.json, &files.json_raw, &files.srt] {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert_eq!(std::fs::read_to_string(&files.txt).unwrap(), "hello");
        let srt = std::fs::read_to_string(&files.srt).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,000\n"));
    }

    #[test]
    fn timestamp_format_matches_output_layout() {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], "_");
        assert_eq!(&stamp[13..14], "-");
    }
}
