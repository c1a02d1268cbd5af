use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::ports::{ChunkRepository, JobRepository, RepositoryError};
use crate::domain::{
    Chunk, ChunkStatus, ErrorCode, Job, JobId, JobStatus, ProviderMetadata, Segment, StorageKey,
};

/// In-memory job store with the same transition semantics as the Postgres
/// repository. Used by tests and scaffold mode.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "job already exists: {}",
                job.id
            )));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn status_of(&self, id: JobId) -> Result<Option<JobStatus>, RepositoryError> {
        Ok(self.lock().get(&id).map(|j| j.status))
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        Ok(self
            .lock()
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        id: JobId,
        expected: &[JobStatus],
        next: JobStatus,
    ) -> Result<bool, RepositoryError> {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !expected.contains(&job.status) {
            return Ok(false);
        }
        job.status = next;
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_original_artifact(
        &self,
        id: JobId,
        key: &StorageKey,
        filename: &str,
        file_size_bytes: i64,
        extension: &str,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        job.original_key = Some(key.clone());
        job.original_filename = Some(filename.to_string());
        job.file_size_bytes = Some(file_size_bytes);
        job.extension = Some(extension.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_duration(&self, id: JobId, duration_seconds: f64) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        job.duration_seconds = Some(duration_seconds);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_total_chunks(&self, id: JobId, total: i32) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        job.total_chunks = total;
        job.completed_chunks = 0;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_completed_chunks(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        job.completed_chunks += 1;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: JobId,
        result_key: &StorageKey,
    ) -> Result<bool, RepositoryError> {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.result_key = Some(result_key.clone());
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn mark_failed(
        &self,
        id: JobId,
        code: ErrorCode,
        message: &str,
    ) -> Result<bool, RepositoryError> {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status.is_terminal() {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = JobStatus::Failed;
        job.error_code = Some(code);
        job.error_message = Some(message.to_string());
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(true)
    }

    async fn reset_for_retry(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        if job.status != JobStatus::Failed {
            return Ok(());
        }
        job.status = JobStatus::Pending;
        job.error_code = None;
        job.error_message = None;
        job.result_key = None;
        job.total_chunks = 0;
        job.completed_chunks = 0;
        job.completed_at = None;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_webhook_sent(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        job.webhook_sent = true;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn sweep_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut swept = 0;
        for job in self.lock().values_mut() {
            if matches!(job.status, JobStatus::Processing | JobStatus::Uploaded)
                && job.updated_at < cutoff
            {
                job.status = JobStatus::Failed;
                job.error_code = Some(ErrorCode::Timeout);
                job.error_message = Some(
                    "job stalled in processing and was recovered by the stale sweep".to_string(),
                );
                job.updated_at = Utc::now();
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn delete(&self, id: JobId) -> Result<(), RepositoryError> {
        self.lock().remove(&id);
        Ok(())
    }
}

/// In-memory chunk store keyed by (job_id, chunk_index).
#[derive(Default)]
pub struct InMemoryChunkRepository {
    chunks: Mutex<HashMap<(JobId, i32), Chunk>>,
}

impl InMemoryChunkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(JobId, i32), Chunk>> {
        self.chunks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkRepository {
    async fn create_many(&self, chunks: &[Chunk]) -> Result<(), RepositoryError> {
        let mut store = self.lock();
        for chunk in chunks {
            store.insert((chunk.job_id, chunk.chunk_index), chunk.clone());
        }
        Ok(())
    }

    async fn get(
        &self,
        job_id: JobId,
        chunk_index: i32,
    ) -> Result<Option<Chunk>, RepositoryError> {
        Ok(self.lock().get(&(job_id, chunk_index)).cloned())
    }

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<Chunk>, RepositoryError> {
        let mut chunks: Vec<Chunk> = self
            .lock()
            .values()
            .filter(|c| c.job_id == job_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn mark_processing(
        &self,
        job_id: JobId,
        chunk_index: i32,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock();
        let chunk = store
            .get_mut(&(job_id, chunk_index))
            .ok_or_else(|| RepositoryError::NotFound(format!("{}/{}", job_id, chunk_index)))?;
        chunk.status = ChunkStatus::Processing;
        chunk.attempt_count += 1;
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: JobId,
        chunk_index: i32,
        segments: &[Segment],
        metadata: &ProviderMetadata,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock();
        let chunk = store
            .get_mut(&(job_id, chunk_index))
            .ok_or_else(|| RepositoryError::NotFound(format!("{}/{}", job_id, chunk_index)))?;
        chunk.status = ChunkStatus::Completed;
        chunk.segments = segments.to_vec();
        chunk.metadata = metadata.clone();
        chunk.last_error = None;
        chunk.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        chunk_index: i32,
        error: &str,
    ) -> Result<(), RepositoryError> {
        let mut store = self.lock();
        let chunk = store
            .get_mut(&(job_id, chunk_index))
            .ok_or_else(|| RepositoryError::NotFound(format!("{}/{}", job_id, chunk_index)))?;
        chunk.status = ChunkStatus::Failed;
        chunk.last_error = Some(error.to_string());
        chunk.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_for_job(&self, job_id: JobId) -> Result<u64, RepositoryError> {
        let mut store = self.lock();
        let before = store.len();
        store.retain(|(jid, _), _| *jid != job_id);
        Ok((before - store.len()) as u64)
    }
}
