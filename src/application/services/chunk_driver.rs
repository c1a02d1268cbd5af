use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ChunkRepository, ChunkTranscription, JobRepository, PlannedChunk, ProviderError,
    RepositoryError, SttProvider, TranscriptionRequest,
};
use crate::domain::{JobId, JobStatus, Segment};

use super::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ChunkDriveError {
    /// The job was cancelled or deleted; stop work, persist nothing further.
    #[error("job cancelled")]
    Cancelled,
    #[error("provider error: {0}")]
    Provider(ProviderError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Drives one chunk through transcription: cancellation probes, transient
/// retries with backoff, coverage validation, and persistence.
pub struct ChunkDriver {
    jobs: Arc<dyn JobRepository>,
    chunks: Arc<dyn ChunkRepository>,
    retry: RetryPolicy,
    coverage_gap_threshold: f64,
    provider_timeout: Duration,
}

impl ChunkDriver {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        chunks: Arc<dyn ChunkRepository>,
        retry: RetryPolicy,
        coverage_gap_threshold: f64,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            chunks,
            retry,
            coverage_gap_threshold,
            provider_timeout,
        }
    }

    /// Runs one chunk to completion. On success the chunk row holds the
    /// segments and metadata; on provider failure the chunk row is FAILED and
    /// the caller fails the job.
    pub async fn run_chunk(
        &self,
        provider: &dyn SttProvider,
        job_id: JobId,
        chunk: &PlannedChunk,
        audio: &[u8],
        request: TranscriptionRequest,
    ) -> Result<ChunkTranscription, ChunkDriveError> {
        self.probe_cancellation(job_id, &request.cancel).await?;

        self.chunks.mark_processing(job_id, chunk.index).await?;

        let result = self
            .transcribe_with_coverage(provider, job_id, chunk, audio, &request)
            .await;

        match result {
            Ok(mut transcription) => {
                // A cancel may have landed while the last call was in flight;
                // its result is discarded, not persisted.
                self.probe_cancellation(job_id, &request.cancel).await?;

                transcription
                    .segments
                    .sort_by(|a, b| a.start.total_cmp(&b.start));
                self.chunks
                    .mark_completed(
                        job_id,
                        chunk.index,
                        &transcription.segments,
                        &transcription.metadata,
                    )
                    .await?;
                self.jobs.increment_completed_chunks(job_id).await?;
                Ok(transcription)
            }
            Err(ChunkDriveError::Provider(e)) => {
                self.chunks
                    .mark_failed(job_id, chunk.index, &e.to_string())
                    .await?;
                Err(ChunkDriveError::Provider(e))
            }
            Err(other) => Err(other),
        }
    }

    /// Coverage loop: when the provider skipped audio at a chunk edge, retry
    /// up to the coverage budget and keep the best (smallest max-gap) result.
    async fn transcribe_with_coverage(
        &self,
        provider: &dyn SttProvider,
        job_id: JobId,
        chunk: &PlannedChunk,
        audio: &[u8],
        request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ChunkDriveError> {
        let mut best = self
            .transcribe_with_retries(provider, job_id, chunk, audio, request)
            .await?;
        let mut best_gap = coverage_gap(&best.segments, chunk.duration());

        let mut coverage_retries_used = 0;
        while best_gap > self.coverage_gap_threshold
            && coverage_retries_used < self.retry.coverage_retries
        {
            coverage_retries_used += 1;
            tracing::warn!(
                chunk_index = chunk.index,
                gap_seconds = best_gap,
                gap_threshold = self.coverage_gap_threshold,
                retry = coverage_retries_used,
                "Coverage gap detected, retrying chunk"
            );

            let candidate = self
                .transcribe_with_retries(provider, job_id, chunk, audio, request)
                .await?;
            let candidate_gap = coverage_gap(&candidate.segments, chunk.duration());

            if candidate_gap < best_gap {
                best = candidate;
                best_gap = candidate_gap;
            }

            if best_gap <= self.coverage_gap_threshold {
                tracing::info!(
                    chunk_index = chunk.index,
                    retry = coverage_retries_used,
                    "Coverage gap resolved after retry"
                );
                break;
            }
        }

        if best_gap > self.coverage_gap_threshold {
            tracing::error!(
                chunk_index = chunk.index,
                gap_seconds = best_gap,
                "Coverage gap persists after retries"
            );
        }

        Ok(best)
    }

    /// Transient-fault loop: backoff with jitter for retryable provider
    /// errors, immediate failure otherwise. Cancellation is re-probed at the
    /// start of every attempt and before every sleep.
    async fn transcribe_with_retries(
        &self,
        provider: &dyn SttProvider,
        job_id: JobId,
        chunk: &PlannedChunk,
        audio: &[u8],
        request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ChunkDriveError> {
        let mut attempt = 0u32;

        loop {
            self.probe_cancellation(job_id, &request.cancel).await?;

            let outcome =
                match tokio::time::timeout(self.provider_timeout, provider.transcribe(audio, request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "provider call exceeded {}s",
                        self.provider_timeout.as_secs()
                    ))),
                };

            match outcome {
                Ok(transcription) => return Ok(transcription),
                Err(e) => {
                    // A cancel may race an in-flight call; the result of a
                    // cancelled call is discarded either way.
                    self.probe_cancellation(job_id, &request.cancel).await?;

                    if !e.is_retryable() {
                        tracing::error!(
                            provider = provider.name(),
                            chunk_index = chunk.index,
                            error = %e,
                            "Non-retryable provider error"
                        );
                        return Err(ChunkDriveError::Provider(e));
                    }

                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        tracing::error!(
                            provider = provider.name(),
                            chunk_index = chunk.index,
                            attempts = attempt,
                            error = %e,
                            "Max retries exceeded"
                        );
                        return Err(ChunkDriveError::Provider(e));
                    }

                    let retry_after = match &e {
                        ProviderError::RateLimited { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay_for(attempt - 1, retry_after);

                    tracing::warn!(
                        provider = provider.name(),
                        chunk_index = chunk.index,
                        attempt,
                        delay_seconds = delay.as_secs_f64(),
                        error = %e,
                        "Provider error, retrying"
                    );

                    self.probe_cancellation(job_id, &request.cancel).await?;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Re-reads the job status from the store. A cancelled or deleted job
    /// stops all work; the token is fired so an in-flight provider call can
    /// bail out early.
    async fn probe_cancellation(
        &self,
        job_id: JobId,
        cancel: &CancellationToken,
    ) -> Result<(), ChunkDriveError> {
        match self.jobs.status_of(job_id).await? {
            Some(JobStatus::Cancelled) | None => {
                cancel.cancel();
                Err(ChunkDriveError::Cancelled)
            }
            Some(_) => Ok(()),
        }
    }
}

/// Largest untranscribed span at either edge of the chunk. Empty segment
/// lists count as a full-duration gap. Timestamps past the chunk duration
/// are clipped first: some providers drift and report segments beyond the
/// audio they were given.
pub fn coverage_gap(segments: &[Segment], chunk_duration: f64) -> f64 {
    if segments.is_empty() {
        return chunk_duration;
    }

    let start_gap = segments
        .iter()
        .map(|s| s.start)
        .fold(f64::INFINITY, f64::min)
        .max(0.0);

    let last_valid_end = segments
        .iter()
        .filter(|s| s.start <= chunk_duration)
        .map(|s| s.end.min(chunk_duration))
        .fold(0.0f64, f64::max);
    let end_gap = (chunk_duration - last_valid_end).max(0.0);

    start_gap.max(end_gap)
}

/// Builds the context handed to the next chunk: the text of the trailing
/// `k` segments of the previous chunk's result.
pub fn trailing_context(segments: &[Segment], k: usize) -> Option<String> {
    if segments.is_empty() || k == 0 {
        return None;
    }

    let tail = &segments[segments.len().saturating_sub(k)..];
    let lines: Vec<String> = tail
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| match &s.speaker {
            Some(speaker) => format!("{}: {}", speaker, s.text.trim()),
            None => s.text.trim().to_string(),
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
