use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChunkStatus, JobId, Segment, StorageKey};

/// Provider-reported accounting for a single transcription call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub latency_ms: Option<u64>,
    pub finish_reason: Option<String>,
    pub model: Option<String>,
    /// Truncated upstream response body, kept for debugging only.
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub job_id: JobId,
    pub chunk_index: i32,
    pub status: ChunkStatus,
    /// Absolute position within the source audio, in seconds.
    pub start_time: f64,
    pub end_time: f64,
    pub storage_key: Option<StorageKey>,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub segments: Vec<Segment>,
    pub metadata: ProviderMetadata,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Chunk {
    pub fn new(job_id: JobId, chunk_index: i32, start_time: f64, end_time: f64) -> Self {
        Self {
            job_id,
            chunk_index,
            status: ChunkStatus::Pending,
            start_time,
            end_time,
            storage_key: None,
            attempt_count: 0,
            last_error: None,
            segments: Vec::new(),
            metadata: ProviderMetadata::default(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}
