use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;

use crate::application::ports::{AudioChunker, AudioError, PlannedChunk};
use crate::config::ChunkingSettings;

/// A detected silence span in the source audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// The final remainder must carry at least this much fresh audio beyond the
/// last split, otherwise it is merged into its predecessor.
const MIN_TAIL_SECONDS: f64 = 1.0;

/// Computes chunk boundaries for audio of `duration` seconds. Split points
/// prefer silence midpoints inside a fixed-width window around each target;
/// consecutive chunks overlap by exactly `overlap_duration`.
///
/// The search window is sized relative to `max_chunk_duration`, never to the
/// absolute target position: scaling by the target produced pathologically
/// wide windows for late chunks.
pub fn plan_boundaries(
    duration: f64,
    silences: &[SilenceInterval],
    max_chunk_duration: f64,
    overlap_duration: f64,
) -> Vec<(f64, f64)> {
    let m = max_chunk_duration;
    let o = overlap_duration;

    if duration <= m {
        return vec![(0.0, duration)];
    }

    let mut boundaries: Vec<(f64, f64)> = Vec::new();
    let mut cursor = 0.0f64;
    let mut prev_split = 0.0f64;

    loop {
        let target_end = prev_split + m;

        if target_end >= duration {
            if duration - prev_split < o + MIN_TAIL_SECONDS {
                // Remainder too small to stand alone; extend the predecessor.
                match boundaries.last_mut() {
                    Some(last) => last.1 = duration,
                    None => boundaries.push((0.0, duration)),
                }
            } else {
                boundaries.push((cursor, duration));
            }
            break;
        }

        let search_start = target_end - 0.2 * m;
        let search_end = (target_end + 0.1 * m).min(duration);

        let split = silences
            .iter()
            .map(SilenceInterval::midpoint)
            .filter(|&p| p >= search_start && p <= search_end && p > prev_split)
            .min_by(|a, b| (a - target_end).abs().total_cmp(&(b - target_end).abs()))
            .unwrap_or(target_end);

        boundaries.push((cursor, split));
        cursor = split - o;
        prev_split = split;
    }

    boundaries
}

/// Parses `silencedetect` log lines into intervals. The filter logs
/// `silence_start: T` and `silence_end: T | silence_duration: D` pairs.
pub fn parse_silence_log<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<SilenceInterval> {
    let mut intervals = Vec::new();
    let mut open_start: Option<f64> = None;

    for line in lines {
        if let Some(rest) = line.split("silence_start:").nth(1) {
            open_start = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        } else if let Some(rest) = line.split("silence_end:").nth(1) {
            let end: Option<f64> = rest.split_whitespace().next().and_then(|v| v.parse().ok());
            if let (Some(start), Some(end)) = (open_start.take(), end) {
                if end > start {
                    intervals.push(SilenceInterval { start, end });
                }
            }
        }
    }

    intervals
}

/// Splits a normalized WAV into silence-aligned overlapping chunks, each
/// extracted to its own WAV file.
pub struct FfmpegChunker {
    settings: ChunkingSettings,
}

impl FfmpegChunker {
    pub fn new(settings: ChunkingSettings) -> Self {
        Self { settings }
    }

    fn detect_silence(
        wav: PathBuf,
        threshold_db: i32,
        min_duration: f64,
    ) -> Result<Vec<SilenceInterval>, AudioError> {
        let filter = format!("silencedetect=noise={}dB:d={}", threshold_db, min_duration);
        let mut child = FfmpegCommand::new()
            .args([
                "-i",
                wav.to_str().unwrap_or_default(),
                "-af",
                filter.as_str(),
                "-f",
                "null",
                "-",
            ])
            .spawn()
            .map_err(|e| AudioError::ToolFailure(format!("ffmpeg spawn failed: {}", e)))?;

        let lines: Vec<String> = child
            .iter()
            .map_err(|e| AudioError::ToolFailure(format!("ffmpeg output: {}", e)))?
            .filter_map(|event| match event {
                FfmpegEvent::Log(_, line) => Some(line),
                _ => None,
            })
            .collect();

        Ok(parse_silence_log(lines.iter().map(String::as_str)))
    }

    fn extract_chunk(
        wav: PathBuf,
        output: PathBuf,
        start: f64,
        duration: f64,
    ) -> Result<(), AudioError> {
        let seek = format!("{:.3}", start);
        let span = format!("{:.3}", duration);
        let mut child = FfmpegCommand::new()
            .args([
                "-y",
                "-ss",
                seek.as_str(),
                "-t",
                span.as_str(),
                "-i",
                wav.to_str().unwrap_or_default(),
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
            return Err(AudioError::ToolFailure(format!(
                "chunk extraction failed at {:.3}s",
                start
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioChunker for FfmpegChunker {
    async fn split(
        &self,
        wav: &Path,
        duration: f64,
        out_dir: &Path,
    ) -> Result<Vec<PlannedChunk>, AudioError> {
        let settings = self.settings.clone();
        let wav_owned = wav.to_path_buf();

        let silences = if duration > settings.max_chunk_duration {
            let threshold = settings.silence_threshold_db;
            let min_silence = settings.min_silence_duration;
            let probe_wav = wav_owned.clone();
            tokio::task::spawn_blocking(move || {
                Self::detect_silence(probe_wav, threshold, min_silence)
            })
            .await
            .map_err(|e| AudioError::ToolFailure(format!("silence task join: {}", e)))??
        } else {
            Vec::new()
        };
        tracing::debug!(silences = silences.len(), "Detected silence intervals");

        let boundaries = plan_boundaries(
            duration,
            &silences,
            settings.max_chunk_duration,
            settings.overlap_duration,
        );

        let mut planned = Vec::with_capacity(boundaries.len());
        for (index, (start, end)) in boundaries.into_iter().enumerate() {
            let output = out_dir.join(format!("chunk_{:04}.wav", index));

            if index == 0 && end >= duration {
                // Single chunk covering the whole file: no re-encode needed.
                tokio::fs::copy(&wav_owned, &output).await?;
            } else {
                let source = wav_owned.clone();
                let target = output.clone();
                tokio::task::spawn_blocking(move || {
                    Self::extract_chunk(source, target, start, end - start)
                })
                .await
                .map_err(|e| AudioError::ToolFailure(format!("extract task join: {}", e)))??;
            }

            planned.push(PlannedChunk {
                index: index as i32,
                start,
                end,
                wav_path: output,
            });
        }

        Ok(planned)
    }
}
