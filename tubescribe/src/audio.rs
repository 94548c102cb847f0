use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Target sample rate for whisper.cpp.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Extract the audio track of a video file to a standalone 16 kHz mono WAV.
///
/// ffmpeg does the demuxing, decoding, resampling and channel mixing in one
/// shot and closes all handles on exit. The output is already in the format
/// whisper wants, so the later decode step is a straight read.
pub async fn extract_audio(video_path: &Path, audio_path: &Path) -> Result<()> {
    if !video_path.exists() {
        return Err(Error::AudioExtract(format!(
            "video file not found: {}",
            video_path.display()
        )));
    }

    info!(
        video = %video_path.display(),
        audio = %audio_path.display(),
        "extracting audio track"
    );

    let output = tokio::process::Command::new("ffmpeg")
        .args(["-nostdin", "-y", "-i"])
        .arg(video_path)
        .args([
            "-vn",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &WHISPER_SAMPLE_RATE.to_string(),
            "-ac",
            "1",
        ])
        .arg(audio_path)
        .output()
        .await
        .map_err(ffmpeg_spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr_truncated: String = stderr.chars().take(1000).collect();
        return Err(Error::AudioExtract(format!(
            "ffmpeg failed: {stderr_truncated}"
        )));
    }

    if !audio_path.exists() {
        return Err(Error::AudioExtract(format!(
            "ffmpeg produced no output at {}",
            audio_path.display()
        )));
    }

    Ok(())
}

/// Load an audio file and return 16kHz mono f32 samples ready for whisper.
///
/// Decodes via an ffmpeg subprocess to raw PCM signed 16-bit little-endian,
/// so any format ffmpeg understands works here, not just the WAVs our own
/// extraction step produces.
pub fn load_samples(path: &Path) -> Result<Vec<f32>> {
    if !path.exists() {
        return Err(Error::AudioNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffmpeg")
        .args(["-nostdin", "-threads", "0", "-i"])
        .arg(path)
        .args([
            "-f",
            "s16le",
            "-ac",
            "1",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &WHISPER_SAMPLE_RATE.to_string(),
            "-",
        ])
        .output()
        .map_err(ffmpeg_spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::AudioDecode(format!("ffmpeg failed: {stderr}")));
    }

    if output.stdout.is_empty() {
        return Err(Error::AudioDecode("ffmpeg produced no output".into()));
    }

    let samples = samples_from_s16le(&output.stdout);
    debug!(
        samples = samples.len(),
        duration_secs = format!("{:.1}", samples.len() as f64 / WHISPER_SAMPLE_RATE as f64),
        "decoded audio"
    );

    Ok(samples)
}

fn ffmpeg_spawn_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::AudioDecode("ffmpeg not found — install with: apt install ffmpeg".into())
    } else {
        Error::AudioDecode(format!("failed to run ffmpeg: {e}"))
    }
}

/// Convert s16le bytes to f32 samples, normalized to [-1.0, 1.0].
fn samples_from_s16le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / 32768.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s16le_conversion_normalizes() {
        let bytes = [0x00, 0x00, 0xff, 0x7f, 0x00, 0x80];
        let samples = samples_from_s16le(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (32767.0 / 32768.0)).abs() < 1e-6);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn s16le_conversion_ignores_trailing_odd_byte() {
        let samples = samples_from_s16le(&[0x00, 0x00, 0x01]);
        assert_eq!(samples.len(), 1);
    }

    #[tokio::test]
    async fn extract_audio_missing_video_errors() {
        let dir = std::env::temp_dir();
        let result = extract_audio(&dir.join("no_such_video.mp4"), &dir.join("out.wav")).await;
        assert!(matches!(result, Err(Error::AudioExtract(_))));
    }
}
