use serde::{Deserialize, Serialize};

/// A transcript segment with whisper's per-segment diagnostics.
///
/// Segments come out of the transcription step in chronological order with
/// ids ascending from 0; nothing downstream re-sorts or re-validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: u32,
    /// Start time in seconds (unrounded; output formats round or truncate).
    pub start: f64,
    /// End time in seconds, `start <= end`.
    pub end: f64,
    pub text: String,
    /// Decode offset in centiseconds.
    pub seek: i64,
    /// Sampling temperature the segment was decoded with.
    pub temperature: f32,
    /// Mean log-probability over the segment's tokens.
    pub avg_logprob: f64,
    /// zlib ratio of the segment text (whisper's repetition heuristic).
    pub compression_ratio: f64,
    pub no_speech_prob: f32,
}

/// Complete transcription result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcript text, whitespace-trimmed.
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
    /// Audio duration in seconds.
    pub duration: f64,
    pub model: String,
    pub source_url: Option<String>,
    pub source_title: Option<String>,
}

impl Transcript {
    /// Trim surrounding whitespace from the full text and every segment.
    /// Runs once, right after transcription, before any formatting.
    pub(crate) fn trim_whitespace(&mut self) {
        self.text = self.text.trim().to_string();
        for seg in &mut self.segments {
            seg.text = seg.text.trim().to_string();
        }
    }
}
