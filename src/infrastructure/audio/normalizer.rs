use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;

use crate::application::ports::{AudioError, AudioNormalizer, NormalizedAudio};

pub const SAMPLE_RATE: u32 = 16_000;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "flac", "ogg", "opus", "webm", "aac", "wma",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "mpeg", "mpg", "3gp",
];

/// Shortest audio the pipeline accepts, in seconds.
const MIN_DURATION_SECONDS: f64 = 0.1;

pub fn check_ffmpeg_binary() -> Result<(), AudioError> {
    let mut child = FfmpegCommand::new()
        .arg("-version")
        .spawn()
        .map_err(|e| AudioError::ToolFailure(format!("ffmpeg binary not found in $PATH: {}", e)))?;

    let status = child
        .wait()
        .map_err(|e| AudioError::ToolFailure(format!("ffmpeg version check failed: {}", e)))?;

    if status.success() {
        Ok(())
    } else {
        Err(AudioError::ToolFailure(
            "ffmpeg binary returned non-zero exit code during version check".to_string(),
        ))
    }
}

pub fn is_supported_extension(extension: &str) -> bool {
    let ext = extension.to_lowercase();
    AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
}

pub fn is_video_extension(extension: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

/// Duration of a WAV file measured from its sample count. The pipeline never
/// trusts source container headers for this.
pub fn wav_duration_seconds(path: &Path) -> Result<f64, AudioError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| AudioError::InvalidAudio(format!("failed to read WAV: {}", e)))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

fn wav_is_normalized(path: &Path) -> bool {
    match hound::WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            spec.channels == 1
                && spec.sample_rate == SAMPLE_RATE
                && spec.sample_format == hound::SampleFormat::Int
                && spec.bits_per_sample == 16
        }
        Err(_) => false,
    }
}

/// Decodes any supported container to mono 16-kHz PCM WAV via ffmpeg. Video
/// containers get their audio track extracted (`-vn`).
pub struct FfmpegNormalizer;

impl FfmpegNormalizer {
    fn run_ffmpeg(input: PathBuf, output: PathBuf) -> Result<(), AudioError> {
        let mut child = FfmpegCommand::new()
            .args([
                "-y",
                "-i",
                input.to_str().unwrap_or_default(),
                "-vn",
                "-ar",
                "16000",
                "-ac",
                "1",
                "-acodec",
                "pcm_s16le",
                output.to_str().unwrap_or_default(),
            ])
            .spawn()
            .map_err(|e| AudioError::ToolFailure(format!("ffmpeg spawn failed: {}", e)))?;

        let status = child
            .wait()
            .map_err(|e| AudioError::ToolFailure(format!("ffmpeg wait: {}", e)))?;

        if !status.success() {
            return Err(AudioError::InvalidAudio(
                "could not decode audio stream: ffmpeg exited with non-zero status".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(
        &self,
        input: &Path,
        extension: &str,
        out_dir: &Path,
    ) -> Result<NormalizedAudio, AudioError> {
        if !is_supported_extension(extension) {
            return Err(AudioError::InvalidAudio(format!(
                "unsupported format: {}",
                extension
            )));
        }

        // Already mono 16-kHz WAV: pass through untouched.
        if extension.eq_ignore_ascii_case("wav") && wav_is_normalized(input) {
            let duration_seconds = wav_duration_seconds(input)?;
            if duration_seconds <= MIN_DURATION_SECONDS {
                return Err(AudioError::InvalidAudio(format!(
                    "audio too short: {:.3}s",
                    duration_seconds
                )));
            }
            tracing::debug!(duration_seconds, "WAV already normalized, passing through");
            return Ok(NormalizedAudio {
                wav_path: input.to_path_buf(),
                duration_seconds,
            });
        }

        if is_video_extension(extension) {
            tracing::info!(extension, "Video file detected, extracting audio track");
        }

        let output = out_dir.join("normalized.wav");
        let input_owned = input.to_path_buf();
        let output_owned = output.clone();

        tokio::task::spawn_blocking(move || Self::run_ffmpeg(input_owned, output_owned))
            .await
            .map_err(|e| AudioError::ToolFailure(format!("ffmpeg task join: {}", e)))??;

        let duration_seconds = wav_duration_seconds(&output)?;
        if duration_seconds <= MIN_DURATION_SECONDS {
            return Err(AudioError::InvalidAudio(format!(
                "audio too short: {:.3}s",
                duration_seconds
            )));
        }

        tracing::debug!(
            duration_seconds,
            "Audio normalized to 16kHz mono WAV via ffmpeg"
        );

        Ok(NormalizedAudio {
            wav_path: output,
            duration_seconds,
        })
    }
}
