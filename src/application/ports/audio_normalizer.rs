use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    pub wav_path: PathBuf,
    /// Measured from the produced WAV; source container headers are
    /// untrusted.
    pub duration_seconds: f64,
}

#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    /// Decodes any supported audio/video container into a mono 16-kHz PCM
    /// WAV under `out_dir`.
    async fn normalize(
        &self,
        input: &Path,
        extension: &str,
        out_dir: &Path,
    ) -> Result<NormalizedAudio, AudioError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
    #[error("ffmpeg failed: {0}")]
    ToolFailure(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
