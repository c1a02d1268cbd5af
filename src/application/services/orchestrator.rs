use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};

use crate::application::ports::{
    BlobStore, BlobStoreError, ChunkRepository, JobQueue, JobRepository, QueueError,
    RepositoryError,
};
use crate::domain::{Job, JobId, JobStatus, StorageKey, TranscriptDocument};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("blob store: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("queue: {0}")]
    Queue(#[from] QueueError),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct NewJobRequest {
    pub provider: String,
    pub language: String,
    pub prompt: Option<String>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_chunks: i32,
    pub completed_chunks: i32,
    pub progress_percent: f64,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

/// Owns the job state machine around the pipeline: creation, upload
/// registration, submission, cancellation, retry, deletion, and stale-job
/// recovery. The worker owns everything between PROCESSING and a terminal
/// status.
pub struct JobOrchestrator {
    jobs: Arc<dyn JobRepository>,
    chunks: Arc<dyn ChunkRepository>,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn JobQueue>,
    stale_job_minutes: i64,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        chunks: Arc<dyn ChunkRepository>,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn JobQueue>,
        stale_job_minutes: i64,
    ) -> Self {
        Self {
            jobs,
            chunks,
            blobs,
            queue,
            stale_job_minutes,
        }
    }

    pub async fn create_job(&self, request: NewJobRequest) -> Result<Job, OrchestratorError> {
        let mut job = Job::new(request.provider, request.language);
        job.prompt = request.prompt;
        job.webhook_url = request.webhook_url;

        self.jobs.create(&job).await?;
        tracing::info!(job_id = %job.id, provider = %job.provider, "Created transcription job");
        Ok(job)
    }

    /// Stores the uploaded artifact and moves PENDING -> UPLOADED.
    pub async fn register_upload(
        &self,
        job_id: JobId,
        filename: &str,
        data: Bytes,
    ) -> Result<StorageKey, OrchestratorError> {
        let job = self.get(job_id).await?;
        if job.status != JobStatus::Pending {
            return Err(OrchestratorError::InvalidState(format!(
                "cannot upload audio for job in state {}",
                job.status
            )));
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, e)| e.to_lowercase())
            .unwrap_or_else(|| "wav".to_string());
        let size = data.len() as i64;

        let key = StorageKey::original(job_id, filename);
        self.blobs.put(&key, data).await?;
        self.jobs
            .set_original_artifact(job_id, &key, filename, size, &extension)
            .await?;
        self.jobs
            .transition(job_id, &[JobStatus::Pending], JobStatus::Uploaded)
            .await?;

        tracing::info!(job_id = %job_id, key = %key, size_bytes = size, "Uploaded audio for job");
        Ok(key)
    }

    /// Puts the job on the queue for the workers.
    pub async fn submit(&self, job_id: JobId) -> Result<(), OrchestratorError> {
        let job = self.get(job_id).await?;
        if !matches!(job.status, JobStatus::Pending | JobStatus::Uploaded) {
            return Err(OrchestratorError::InvalidState(format!(
                "job cannot be submitted in state {}",
                job.status
            )));
        }
        if job.original_key.is_none() {
            return Err(OrchestratorError::InvalidState(
                "no audio file uploaded for this job".to_string(),
            ));
        }

        self.queue.enqueue(job_id).await?;
        tracing::info!(job_id = %job_id, "Submitted job for processing");
        Ok(())
    }

    pub async fn progress(&self, job_id: JobId) -> Result<JobProgress, OrchestratorError> {
        let job = self.get(job_id).await?;

        let progress_percent = if job.total_chunks > 0 {
            (job.completed_chunks as f64 / job.total_chunks as f64) * 100.0
        } else {
            0.0
        };

        Ok(JobProgress {
            job_id,
            status: job.status,
            total_chunks: job.total_chunks,
            completed_chunks: job.completed_chunks,
            progress_percent,
            duration_seconds: job.duration_seconds,
            error_message: job.error_message,
        })
    }

    /// Fetches the final transcript document; None until the job completes.
    pub async fn result(
        &self,
        job_id: JobId,
    ) -> Result<Option<TranscriptDocument>, OrchestratorError> {
        let job = self.get(job_id).await?;
        if job.status != JobStatus::Completed {
            return Ok(None);
        }
        let Some(key) = &job.result_key else {
            return Ok(None);
        };

        let body = self.blobs.fetch(key).await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Marks the job CANCELLED. The worker polls this status and stops at
    /// the next probe point; completed chunks are left intact.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), OrchestratorError> {
        let applied = self
            .jobs
            .transition(
                job_id,
                &[JobStatus::Pending, JobStatus::Uploaded, JobStatus::Processing],
                JobStatus::Cancelled,
            )
            .await?;

        if !applied {
            let job = self.get(job_id).await?;
            return Err(OrchestratorError::InvalidState(format!(
                "cannot cancel job in state {}",
                job.status
            )));
        }

        tracing::info!(job_id = %job_id, "Cancelled job");
        Ok(())
    }

    /// Retries a FAILED job from scratch: chunk rows are dropped (providers
    /// may have changed, completed chunks are not reused), error fields
    /// cleared, and the job requeued. Cancelled jobs cannot be resumed.
    pub async fn retry(&self, job_id: JobId) -> Result<(), OrchestratorError> {
        let job = self.get(job_id).await?;
        if job.status != JobStatus::Failed {
            return Err(OrchestratorError::InvalidState(format!(
                "can only retry FAILED jobs, current status: {}",
                job.status
            )));
        }

        let dropped = self.chunks.delete_for_job(job_id).await?;
        self.jobs.reset_for_retry(job_id).await?;
        self.queue.enqueue(job_id).await?;

        tracing::info!(job_id = %job_id, dropped_chunks = dropped, "Retrying failed job");
        Ok(())
    }

    /// Deletes the job row (chunks cascade) and every blob under its prefix.
    pub async fn delete(&self, job_id: JobId) -> Result<(), OrchestratorError> {
        let _ = self.get(job_id).await?;

        let removed = self
            .blobs
            .delete_prefix(&StorageKey::job_prefix(job_id))
            .await?;
        self.jobs.delete(job_id).await?;

        tracing::info!(job_id = %job_id, deleted_blobs = removed, "Deleted job");
        Ok(())
    }

    /// Start-up recovery: jobs stuck in PROCESSING/UPLOADED past the stale
    /// window are failed (crashed-worker zombies), then still-queued work is
    /// put back on the queue.
    pub async fn recover_on_startup(&self) -> Result<(), OrchestratorError> {
        let cutoff = Utc::now() - Duration::minutes(self.stale_job_minutes);
        let swept = self.jobs.sweep_stale(cutoff).await?;
        if swept > 0 {
            tracing::warn!(swept, "Marked stale jobs as failed");
        }

        for status in [JobStatus::Uploaded, JobStatus::Pending] {
            for job in self.jobs.list_by_status(status).await? {
                if job.original_key.is_some() {
                    self.queue.enqueue(job.id).await?;
                    tracing::info!(job_id = %job.id, "Requeued job on startup");
                }
            }
        }

        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Job, OrchestratorError> {
        self.jobs
            .get_by_id(job_id)
            .await?
            .ok_or(OrchestratorError::NotFound(job_id))
    }
}
