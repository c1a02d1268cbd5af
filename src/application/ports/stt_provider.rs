use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{ErrorCode, ProviderMetadata, Segment};

/// Everything a provider needs for one chunk call.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// BCP-47 language tag.
    pub language: String,
    /// User-supplied steering prompt from the job, if any.
    pub prompt: Option<String>,
    /// Text of the trailing segments of the previous chunk. Empty for chunk 0.
    pub context_text: Option<String>,
    pub chunk_index: i32,
    pub chunk_duration: f64,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct ChunkTranscription {
    /// Chunk-local timestamps in seconds, sorted by start.
    pub segments: Vec<Segment>,
    pub metadata: ProviderMetadata,
}

/// Capability abstraction over external STT services. New providers are
/// added by registering a constructor, never by touching the chunk driver.
#[async_trait]
pub trait SttProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        audio: &[u8],
        request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Seconds suggested by a Retry-After header, when present.
        retry_after: Option<f64>,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Unknown(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Timeout(_)
                | ProviderError::Unavailable(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ProviderError::RateLimited { .. } => ErrorCode::RateLimited,
            ProviderError::Timeout(_) => ErrorCode::Timeout,
            ProviderError::Auth(_) => ErrorCode::AuthError,
            ProviderError::QuotaExceeded(_) => ErrorCode::QuotaExceeded,
            ProviderError::InvalidAudio(_) => ErrorCode::InvalidAudio,
            ProviderError::Unavailable(_) => ErrorCode::ProviderUnavailable,
            ProviderError::Unknown(message) => ErrorCode::from_message(message),
        }
    }

    /// Maps an HTTP response to the typed variant a driver can act on.
    pub fn from_status(status: u16, body: &str, retry_after: Option<f64>) -> Self {
        match status {
            429 => ProviderError::RateLimited {
                message: format!("status 429: {}", body),
                retry_after,
            },
            401 | 403 => ProviderError::Auth(format!("status {}: {}", status, body)),
            402 => ProviderError::QuotaExceeded(format!("status 402: {}", body)),
            400 | 415 | 422 => ProviderError::InvalidAudio(format!("status {}: {}", status, body)),
            408 | 504 => ProviderError::Timeout(format!("status {}: {}", status, body)),
            s if s >= 500 => ProviderError::Unavailable(format!("status {}: {}", s, body)),
            s => ProviderError::Unknown(format!("status {}: {}", s, body)),
        }
    }
}

/// Prompt preamble shared by providers. The merger owns deduplication, so
/// the model must transcribe the full chunk including the overlap; an
/// instruction to "not repeat" context caused multi-second skips at chunk
/// starts.
pub fn build_prompt(request: &TranscriptionRequest) -> String {
    let mut parts = vec![format!(
        "Transcribe ALL audio starting at timestamp 0.0, including any speech that \
         overlaps or repeats the context below. Do not skip or summarize anything. \
         Primary language: {}.",
        request.language
    )];

    if let Some(prompt) = &request.prompt {
        parts.push(prompt.clone());
    }

    if let Some(context) = &request.context_text {
        if !context.is_empty() {
            parts.push(format!(
                "The previous section ended with: \"{}\". Continue from the audio itself, \
                 not from this text.",
                context
            ));
        }
    }

    parts.join(" ")
}
