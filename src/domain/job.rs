use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ErrorCode, JobStatus, StorageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub original_filename: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub extension: Option<String>,
    /// Measured from the normalized WAV, never from source headers.
    pub duration_seconds: Option<f64>,
    pub provider: String,
    pub language: String,
    pub prompt: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_sent: bool,
    pub original_key: Option<StorageKey>,
    pub result_key: Option<StorageKey>,
    pub total_chunks: i32,
    pub completed_chunks: i32,
    pub error_message: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(provider: String, language: String) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            original_filename: None,
            file_size_bytes: None,
            extension: None,
            duration_seconds: None,
            provider,
            language,
            prompt: None,
            webhook_url: None,
            webhook_sent: false,
            original_key: None,
            result_key: None,
            total_chunks: 0,
            completed_chunks: 0,
            error_message: None,
            error_code: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
