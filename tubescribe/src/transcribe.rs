use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::WHISPER_SAMPLE_RATE;
use crate::config::{Language, TranscribeOptions};
use crate::error::{Error, Result};
use crate::types::{Segment, Transcript};

/// Transcribe audio samples using whisper.cpp.
/// Samples must be 16kHz mono f32. Blocks until the whole run finishes;
/// incremental progress is reported only through `options.progress`.
pub fn transcribe_samples(
    samples: &[f32],
    model_path: &Path,
    options: &TranscribeOptions,
) -> Result<Transcript> {
    info!(model = %model_path.display(), "loading whisper model");

    let mut ctx_params = WhisperContextParameters::new();
    ctx_params.use_gpu(options.gpu);
    ctx_params.gpu_device(options.gpu_device as i32);

    let ctx = WhisperContext::new_with_params(
        model_path
            .to_str()
            .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
        ctx_params,
    )?;

    let mut state = ctx.create_state()?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });

    match &options.language {
        Language::Auto => params.set_detect_language(true),
        Language::Code { code, .. } => params.set_language(Some(code)),
    }

    params.set_temperature(options.temperature);

    if let Some(n) = options.n_threads {
        params.set_n_threads(n as i32);
    }

    // Disable stderr printing from whisper.cpp
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    if let Some(progress) = options.progress.clone() {
        params.set_progress_callback_safe(move |pct: i32| progress(pct));
    }

    info!(samples = samples.len(), "running transcription");
    state.full(params, samples)?;

    let num_segments = state.full_n_segments();
    debug!(num_segments, "transcription complete");

    let mut segments = Vec::with_capacity(num_segments as usize);

    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| Error::Transcription(format!("segment {i} not found")))?;

        let start_ts = segment.start_timestamp();
        let end_ts = segment.end_timestamp();
        let text = segment
            .to_str_lossy()
            .map_err(|e| Error::Transcription(format!("segment text error: {e}")))?
            .into_owned();
        let no_speech_prob = segment.no_speech_probability();

        // Mean log-probability over the segment's scored tokens.
        let n_tokens = segment.n_tokens();
        let mut plog_sum = 0.0f64;
        let mut n_scored = 0u32;
        for t in 0..n_tokens {
            if let Some(token) = segment.get_token(t) {
                plog_sum += token.token_data().plog as f64;
                n_scored += 1;
            }
        }
        let avg_logprob = if n_scored > 0 {
            plog_sum / n_scored as f64
        } else {
            0.0
        };

        segments.push(Segment {
            id: i as u32,
            start: start_ts as f64 / 100.0,
            end: end_ts as f64 / 100.0,
            seek: start_ts,
            temperature: options.temperature,
            avg_logprob,
            compression_ratio: compression_ratio(&text),
            no_speech_prob,
            text,
        });
    }

    // Whisper's full text is the segment texts back to back, spacing
    // preserved; surrounding whitespace gets trimmed later, once.
    let text: String = segments.iter().map(|s| s.text.as_str()).collect();

    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;

    let detected_lang_id = state.full_lang_id_from_state();
    let language = whisper_rs::get_lang_str(detected_lang_id)
        .unwrap_or("unknown")
        .to_string();

    Ok(Transcript {
        text,
        segments,
        language,
        duration,
        model: options.model.name().to_string(),
        source_url: None,
        source_title: None,
    })
}

/// zlib ratio of the text, whisper's own repetition heuristic:
/// uncompressed length over compressed length, 0.0 for empty text.
fn compression_ratio(text: &str) -> f64 {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return 0.0;
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(bytes).is_err() {
        return 0.0;
    }
    match encoder.finish() {
        Ok(compressed) if !compressed.is_empty() => bytes.len() as f64 / compressed.len() as f64,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_ratio_empty_is_zero() {
        assert_eq!(compression_ratio(""), 0.0);
    }

    #[test]
    fn compression_ratio_flags_repetition() {
        let repetitive = "la la la la la la la la la la la la la la la la";
        let varied = "the quick brown fox jumps over the lazy dog";
        assert!(compression_ratio(repetitive) > compression_ratio(varied));
    }
}
