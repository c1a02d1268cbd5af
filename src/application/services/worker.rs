use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    AudioChunker, AudioError, AudioNormalizer, BlobStore, BlobStoreError, ChunkRepository,
    JobQueue, JobRepository, PlannedChunk, ProviderRegistry, QueueError, RepositoryError,
    SttProvider, TranscriptionRequest,
};
use crate::config::ChunkingSettings;
use crate::domain::{
    Chunk, ErrorCode, Job, JobId, JobStatus, Segment, StorageKey, TranscriptDocument,
};

use super::chunk_driver::{trailing_context, ChunkDriveError, ChunkDriver};
use super::merger::{ChunkResult, TranscriptMerger};
use super::webhook::WebhookNotifier;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("blob store: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("queue: {0}")]
    Queue(#[from] QueueError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Consumes `{job_id}` queue messages and runs the full pipeline for each:
/// normalize, chunk, transcribe chunk-by-chunk, merge, persist. Multiple
/// workers run in parallel across jobs; within a job, chunks are strictly
/// sequential because chunk N+1 receives chunk N's trailing text as context.
pub struct TranscriptionWorker {
    queue: Arc<dyn JobQueue>,
    jobs: Arc<dyn JobRepository>,
    chunks: Arc<dyn ChunkRepository>,
    blobs: Arc<dyn BlobStore>,
    normalizer: Arc<dyn AudioNormalizer>,
    chunker: Arc<dyn AudioChunker>,
    providers: Arc<ProviderRegistry>,
    driver: ChunkDriver,
    merger: TranscriptMerger,
    webhook: Option<Arc<WebhookNotifier>>,
    chunking: ChunkingSettings,
}

impl TranscriptionWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn JobQueue>,
        jobs: Arc<dyn JobRepository>,
        chunks: Arc<dyn ChunkRepository>,
        blobs: Arc<dyn BlobStore>,
        normalizer: Arc<dyn AudioNormalizer>,
        chunker: Arc<dyn AudioChunker>,
        providers: Arc<ProviderRegistry>,
        driver: ChunkDriver,
        webhook: Option<Arc<WebhookNotifier>>,
        chunking: ChunkingSettings,
    ) -> Self {
        let merger = TranscriptMerger::new(chunking.overlap_similarity_threshold);
        Self {
            queue,
            jobs,
            chunks,
            blobs,
            normalizer,
            chunker,
            providers,
            driver,
            merger,
            webhook,
            chunking,
        }
    }

    pub async fn run(self: Arc<Self>) {
        tracing::info!("Transcription worker started");
        loop {
            let message = match self.queue.dequeue().await {
                Ok(Some(message)) => message,
                Ok(None) | Err(QueueError::Closed) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Queue receive failed");
                    continue;
                }
            };

            let span = tracing::info_span!("transcription_job", job_id = %message.job_id);
            let outcome = self
                .process_job(message.job_id)
                .instrument(span)
                .await;

            match outcome {
                // The job reached a terminal status (or was dropped on
                // purpose); only now is the message acknowledged.
                Ok(()) => {
                    if let Err(e) = self.queue.ack(&message).await {
                        tracing::warn!(error = %e, "Failed to ack queue message");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Transcription job left non-terminal, not acking");
                }
            }
        }
        tracing::info!("Transcription worker stopped: queue closed");
    }

    async fn process_job(&self, job_id: JobId) -> Result<(), WorkerError> {
        let started = Instant::now();

        let Some(job) = self.jobs.get_by_id(job_id).await? else {
            tracing::warn!("Job vanished before processing, dropping message");
            return Ok(());
        };

        let claimed = self
            .jobs
            .transition(
                job_id,
                &[JobStatus::Pending, JobStatus::Uploaded, JobStatus::Processing],
                JobStatus::Processing,
            )
            .await?;
        if !claimed {
            tracing::warn!(status = %job.status, "Job not in a processable state, dropping message");
            return Ok(());
        }

        let Some(provider) = self.providers.resolve(&job.provider) else {
            self.fail_job(
                job_id,
                ErrorCode::Unknown,
                &format!("unknown transcription provider: {}", job.provider),
            )
            .await?;
            return Ok(());
        };

        // Per-job scratch dir; dropped (and removed) on every exit path.
        let workdir = tempfile::tempdir()?;

        match self
            .run_pipeline(&job, provider.as_ref(), workdir.path(), started)
            .await
        {
            Ok(PipelineOutcome::Completed) => Ok(()),
            Ok(PipelineOutcome::Cancelled) => {
                tracing::info!("Job cancelled, stopping without further updates");
                Ok(())
            }
            Err(PipelineError::Fatal { code, message }) => {
                self.fail_job(job_id, code, &message).await?;
                Ok(())
            }
            Err(PipelineError::Worker(e)) => Err(e),
        }
    }

    async fn run_pipeline(
        &self,
        job: &Job,
        provider: &dyn SttProvider,
        workdir: &std::path::Path,
        started: Instant,
    ) -> Result<PipelineOutcome, PipelineError> {
        let job_id = job.id;

        let Some(original_key) = &job.original_key else {
            return Err(PipelineError::Fatal {
                code: ErrorCode::InvalidAudio,
                message: "no audio artifact uploaded for this job".to_string(),
            });
        };

        let original = self
            .blobs
            .fetch(original_key)
            .await
            .map_err(WorkerError::from)?;

        let extension = job
            .extension
            .clone()
            .or_else(|| {
                job.original_filename
                    .as_deref()
                    .and_then(|f| f.rsplit_once('.').map(|(_, e)| e.to_lowercase()))
            })
            .unwrap_or_else(|| "wav".to_string());

        let input_path = workdir.join(format!("input.{}", extension));
        tokio::fs::write(&input_path, &original)
            .await
            .map_err(WorkerError::from)?;

        tracing::debug!(bytes = original.len(), extension = %extension, "Starting audio normalization");
        let normalized = match self
            .normalizer
            .normalize(&input_path, &extension, workdir)
            .await
        {
            Ok(normalized) => normalized,
            Err(e) => return Err(audio_failure(e)),
        };

        self.jobs
            .set_duration(job_id, normalized.duration_seconds)
            .await
            .map_err(WorkerError::from)?;

        let planned = match self
            .chunker
            .split(&normalized.wav_path, normalized.duration_seconds, workdir)
            .await
        {
            Ok(planned) => planned,
            Err(e) => return Err(audio_failure(e)),
        };
        tracing::info!(
            chunks = planned.len(),
            duration_seconds = normalized.duration_seconds,
            "Audio chunked"
        );

        self.materialize_chunks(job_id, &planned)
            .await
            .map_err(PipelineError::Worker)?;

        let mut results: Vec<ChunkResult> = Vec::with_capacity(planned.len());
        let mut previous_segments: Vec<Segment> = Vec::new();

        for chunk in &planned {
            let audio = tokio::fs::read(&chunk.wav_path)
                .await
                .map_err(WorkerError::from)?;

            let context_text = if chunk.index > 0 {
                trailing_context(&previous_segments, self.chunking.context_segments)
            } else {
                None
            };
            if let Some(context) = &context_text {
                tracing::debug!(
                    chunk_index = chunk.index,
                    context_chars = context.len(),
                    "Passing context to chunk"
                );
            }

            let request = TranscriptionRequest {
                language: job.language.clone(),
                prompt: job.prompt.clone(),
                context_text,
                chunk_index: chunk.index,
                chunk_duration: chunk.duration(),
                cancel: CancellationToken::new(),
            };

            match self
                .driver
                .run_chunk(provider, job_id, chunk, &audio, request)
                .await
            {
                Ok(transcription) => {
                    previous_segments = transcription.segments.clone();
                    results.push(ChunkResult {
                        chunk_index: chunk.index,
                        start_time: chunk.start,
                        end_time: chunk.end,
                        segments: transcription.segments,
                    });
                }
                Err(ChunkDriveError::Cancelled) => return Ok(PipelineOutcome::Cancelled),
                Err(ChunkDriveError::Provider(e)) => {
                    return Err(PipelineError::Fatal {
                        code: e.code(),
                        message: e.to_string(),
                    })
                }
                Err(ChunkDriveError::Repository(e)) => {
                    return Err(PipelineError::Worker(e.into()))
                }
            }
        }

        let transcript = self.merger.merge(&results);
        let document = TranscriptDocument::from_transcript(
            job_id.to_string(),
            normalized.duration_seconds,
            provider.name().to_string(),
            started.elapsed().as_secs_f64(),
            results.len() as u32,
            &transcript,
        );

        let result_key = StorageKey::result(job_id);
        let body = serde_json::to_vec(&document).map_err(WorkerError::from)?;
        self.blobs
            .put(&result_key, Bytes::from(body))
            .await
            .map_err(WorkerError::from)?;

        let completed = self
            .jobs
            .mark_completed(job_id, &result_key)
            .await
            .map_err(WorkerError::from)?;
        if !completed {
            // Cancelled between the last chunk and here: discard the result.
            let _ = self.blobs.delete(&result_key).await;
            return Ok(PipelineOutcome::Cancelled);
        }

        tracing::info!(
            chunks_processed = results.len(),
            processing_seconds = started.elapsed().as_secs_f64(),
            "Transcription job completed"
        );

        if let (Some(notifier), Some(url)) = (&self.webhook, &job.webhook_url) {
            notifier.clone().notify_later(job_id, url.clone());
        }

        Ok(PipelineOutcome::Completed)
    }

    /// Uploads each chunk WAV and materializes the chunk rows. Any rows left
    /// over from a previous run are dropped first so a retried job always
    /// restarts from chunk 0.
    async fn materialize_chunks(
        &self,
        job_id: JobId,
        planned: &[PlannedChunk],
    ) -> Result<(), WorkerError> {
        self.chunks.delete_for_job(job_id).await?;

        let mut rows = Vec::with_capacity(planned.len());
        for chunk in planned {
            let key = StorageKey::chunk(job_id, chunk.index);
            let data = tokio::fs::read(&chunk.wav_path).await?;
            self.blobs.put(&key, Bytes::from(data)).await?;

            let mut row = Chunk::new(job_id, chunk.index, chunk.start, chunk.end);
            row.storage_key = Some(key);
            rows.push(row);
        }

        self.chunks.create_many(&rows).await?;
        self.jobs.set_total_chunks(job_id, rows.len() as i32).await?;
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: JobId,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), WorkerError> {
        tracing::error!(error_code = %code, error = message, "Transcription job failed");
        self.jobs.mark_failed(job_id, code, message).await?;
        Ok(())
    }
}

enum PipelineOutcome {
    Completed,
    Cancelled,
}

enum PipelineError {
    /// Fails the job with a classified code.
    Fatal { code: ErrorCode, message: String },
    /// Infrastructure trouble; leave the job non-terminal for redelivery.
    Worker(WorkerError),
}

impl From<WorkerError> for PipelineError {
    fn from(e: WorkerError) -> Self {
        PipelineError::Worker(e)
    }
}

fn audio_failure(e: AudioError) -> PipelineError {
    match e {
        AudioError::InvalidAudio(message) => PipelineError::Fatal {
            code: ErrorCode::InvalidAudio,
            message,
        },
        AudioError::ToolFailure(message) => PipelineError::Fatal {
            code: ErrorCode::InvalidAudio,
            message,
        },
        AudioError::Io(e) => PipelineError::Worker(WorkerError::Io(e)),
    }
}
