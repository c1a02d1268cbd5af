use std::fmt;

use super::JobId;

/// Blob key within the object store. All keys embed the job id so a job's
/// blobs can be deleted by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn original(job_id: JobId, filename: &str) -> Self {
        Self(format!("jobs/{}/original/{}", job_id, filename))
    }

    pub fn chunk(job_id: JobId, chunk_index: i32) -> Self {
        Self(format!("jobs/{}/chunks/chunk-{:04}.wav", job_id, chunk_index))
    }

    pub fn result(job_id: JobId) -> Self {
        Self(format!("jobs/{}/result/transcript.json", job_id))
    }

    pub fn job_prefix(job_id: JobId) -> Self {
        Self(format!("jobs/{}/", job_id))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
