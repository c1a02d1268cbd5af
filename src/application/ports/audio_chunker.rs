use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::AudioError;

/// One planned chunk with its extracted WAV on local disk.
#[derive(Debug, Clone)]
pub struct PlannedChunk {
    pub index: i32,
    /// Absolute boundaries in seconds within the source audio.
    pub start: f64,
    pub end: f64,
    pub wav_path: PathBuf,
}

impl PlannedChunk {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[async_trait]
pub trait AudioChunker: Send + Sync {
    /// Splits a normalized WAV into overlapping, silence-aligned chunks,
    /// extracting each to its own WAV under `out_dir`. Short audio yields a
    /// single chunk covering [0, duration].
    async fn split(
        &self,
        wav: &Path,
        duration: f64,
        out_dir: &Path,
    ) -> Result<Vec<PlannedChunk>, AudioError>;
}
