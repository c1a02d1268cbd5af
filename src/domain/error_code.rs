use std::fmt;
use std::str::FromStr;

/// Failure classification stored on a failed job. Non-null iff the job
/// status is FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    RateLimited,
    Timeout,
    ProviderUnavailable,
    AuthError,
    QuotaExceeded,
    InvalidAudio,
    Unknown,
}

const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out", "deadline exceeded", "read timed out"];
const AUTH_PATTERNS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "invalid api key",
    "permission denied",
];
const AUDIO_PATTERNS: &[&str] = &[
    "invalid audio",
    "unsupported format",
    "corrupt",
    "could not decode",
    "bad request",
];
const UNAVAILABLE_PATTERNS: &[&str] = &[
    "503",
    "502",
    "service unavailable",
    "bad gateway",
    "connection refused",
    "connection reset",
];
const QUOTA_PATTERNS: &[&str] = &["quota", "billing", "payment required", "402"];

fn matches_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ProviderUnavailable => "provider_unavailable",
            ErrorCode::AuthError => "auth_error",
            ErrorCode::QuotaExceeded => "quota_exceeded",
            ErrorCode::InvalidAudio => "invalid_audio",
            ErrorCode::Unknown => "unknown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimited | ErrorCode::Timeout | ErrorCode::ProviderUnavailable
        )
    }

    /// Short operator/user-facing explanation stored next to the raw error.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::RateLimited => {
                "The transcription provider is temporarily rate-limiting requests. \
                 Please try again in a few minutes."
            }
            ErrorCode::Timeout => {
                "The transcription request timed out. This can happen with very long \
                 audio files. Please try again."
            }
            ErrorCode::ProviderUnavailable => {
                "The transcription provider is currently unavailable. Please try again later."
            }
            ErrorCode::AuthError => {
                "Authentication with the transcription provider failed. \
                 Please check provider API key configuration."
            }
            ErrorCode::QuotaExceeded => {
                "The provider API quota has been exceeded. Please contact the administrator."
            }
            ErrorCode::InvalidAudio => {
                "The audio file could not be processed. It may be corrupted or in an \
                 unsupported format."
            }
            ErrorCode::Unknown => "Transcription failed.",
        }
    }

    /// Fallback classification for errors that arrive as bare text, matched
    /// against the lowercased message.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if matches_any(&lower, TIMEOUT_PATTERNS) {
            return ErrorCode::Timeout;
        }
        if lower.contains("429")
            || lower.contains("resource exhausted")
            || lower.contains("resourceexhausted")
        {
            return ErrorCode::RateLimited;
        }
        if matches_any(&lower, QUOTA_PATTERNS) {
            return ErrorCode::QuotaExceeded;
        }
        if matches_any(&lower, AUTH_PATTERNS) {
            return ErrorCode::AuthError;
        }
        if matches_any(&lower, AUDIO_PATTERNS) {
            return ErrorCode::InvalidAudio;
        }
        if matches_any(&lower, UNAVAILABLE_PATTERNS) {
            return ErrorCode::ProviderUnavailable;
        }

        ErrorCode::Unknown
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rate_limited" => Ok(ErrorCode::RateLimited),
            "timeout" => Ok(ErrorCode::Timeout),
            "provider_unavailable" => Ok(ErrorCode::ProviderUnavailable),
            "auth_error" => Ok(ErrorCode::AuthError),
            "quota_exceeded" => Ok(ErrorCode::QuotaExceeded),
            "invalid_audio" => Ok(ErrorCode::InvalidAudio),
            "unknown" => Ok(ErrorCode::Unknown),
            _ => Err(format!("Invalid error code: {}", s)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
