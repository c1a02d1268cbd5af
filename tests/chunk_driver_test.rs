mod helpers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use helpers::{seg, transcription, ScriptedProvider};
use tavush::application::ports::{
    ChunkRepository, JobRepository, PlannedChunk, ProviderError, TranscriptionRequest,
};
use tavush::application::services::{coverage_gap, ChunkDriveError, ChunkDriver, RetryPolicy};
use tavush::config::RetrySettings;
use tavush::domain::{Chunk, ChunkStatus, Job, JobStatus, Segment};
use tavush::infrastructure::persistence::{InMemoryChunkRepository, InMemoryJobRepository};
use tokio_util::sync::CancellationToken;

const CHUNK_DURATION: f64 = 120.0;

struct Fixture {
    jobs: Arc<dyn JobRepository>,
    chunks: Arc<dyn ChunkRepository>,
    driver: ChunkDriver,
    job: Job,
    planned: PlannedChunk,
}

async fn fixture() -> Fixture {
    let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
    let chunks: Arc<dyn ChunkRepository> = Arc::new(InMemoryChunkRepository::new());

    let mut job = Job::new("scripted".to_string(), "en".to_string());
    job.status = JobStatus::Processing;
    jobs.create(&job).await.unwrap();

    chunks
        .create_many(&[Chunk::new(job.id, 0, 0.0, CHUNK_DURATION)])
        .await
        .unwrap();

    // Fast backoff so transient-retry tests finish quickly.
    let retry = RetryPolicy::new(&RetrySettings {
        max_attempts: 3,
        coverage_retries: 2,
        base_delay_seconds: 0.005,
        max_delay_seconds: 0.01,
        exponential_base: 2.0,
        jitter_max_seconds: 0.001,
    });

    let driver = ChunkDriver::new(
        Arc::clone(&jobs),
        Arc::clone(&chunks),
        retry,
        15.0,
        Duration::from_secs(5),
    );

    let planned = PlannedChunk {
        index: 0,
        start: 0.0,
        end: CHUNK_DURATION,
        wav_path: PathBuf::from("unused.wav"),
    };

    Fixture {
        jobs,
        chunks,
        driver,
        job,
        planned,
    }
}

fn request() -> TranscriptionRequest {
    TranscriptionRequest {
        language: "en".to_string(),
        prompt: None,
        context_text: None,
        chunk_index: 0,
        chunk_duration: CHUNK_DURATION,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test]
async fn given_start_gap_on_first_attempt_when_driving_then_second_attempt_result_used() {
    let f = fixture().await;
    let provider = ScriptedProvider::new(|call| match call {
        0 => transcription(vec![seg(34.5, 118.0, "late transcript")]),
        _ => transcription(vec![seg(0.2, 119.5, "full transcript")]),
    });

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await
        .unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(result.segments[0].start, 0.2);

    let chunk = f.chunks.get(f.job.id, 0).await.unwrap().unwrap();
    assert_eq!(chunk.status, ChunkStatus::Completed);
    assert_eq!(chunk.segments[0].start, 0.2);
}

#[tokio::test]
async fn given_persistent_gap_when_driving_then_at_most_two_extra_attempts_and_best_kept() {
    let f = fixture().await;
    // Deterministic provider: every attempt skips the first 34.5s.
    let provider = ScriptedProvider::new(|_| transcription(vec![seg(34.5, 118.0, "always late")]));

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await
        .unwrap();

    // 1 initial + exactly 2 coverage retries
    assert_eq!(provider.calls(), 3);
    // best observed gap is the minimum across attempts
    assert_eq!(coverage_gap(&result.segments, CHUNK_DURATION), 34.5);

    let chunk = f.chunks.get(f.job.id, 0).await.unwrap().unwrap();
    assert_eq!(chunk.status, ChunkStatus::Completed);
}

#[tokio::test]
async fn given_transient_error_when_driving_then_retried_until_success() {
    let f = fixture().await;
    let provider = ScriptedProvider::new(|call| match call {
        0 => Err(ProviderError::RateLimited {
            message: "slow down".to_string(),
            retry_after: None,
        }),
        1 => Err(ProviderError::Unavailable("status 503".to_string())),
        _ => transcription(vec![seg(0.0, 119.0, "made it")]),
    });

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await
        .unwrap();

    assert_eq!(provider.calls(), 3);
    assert_eq!(result.segments[0].text, "made it");
}

#[tokio::test]
async fn given_auth_error_when_driving_then_chunk_fails_without_retry() {
    let f = fixture().await;
    let provider =
        ScriptedProvider::new(|_| Err(ProviderError::Auth("status 401: bad key".to_string())));

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await;

    assert_eq!(provider.calls(), 1);
    assert!(matches!(
        result,
        Err(ChunkDriveError::Provider(ProviderError::Auth(_)))
    ));

    let chunk = f.chunks.get(f.job.id, 0).await.unwrap().unwrap();
    assert_eq!(chunk.status, ChunkStatus::Failed);
    assert!(chunk.last_error.unwrap().contains("401"));
}

#[tokio::test]
async fn given_exhausted_transient_retries_when_driving_then_chunk_fails() {
    let f = fixture().await;
    let provider =
        ScriptedProvider::new(|_| Err(ProviderError::Unavailable("status 502".to_string())));

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await;

    assert_eq!(provider.calls(), 3);
    assert!(matches!(result, Err(ChunkDriveError::Provider(_))));
}

#[tokio::test]
async fn given_cancelled_job_when_driving_then_no_provider_call_and_chunk_untouched() {
    let f = fixture().await;
    f.jobs
        .transition(f.job.id, &[JobStatus::Processing], JobStatus::Cancelled)
        .await
        .unwrap();

    let provider = ScriptedProvider::new(|_| transcription(vec![seg(0.0, 119.0, "unreachable")]));

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await;

    assert!(matches!(result, Err(ChunkDriveError::Cancelled)));
    assert_eq!(provider.calls(), 0);

    // No PROCESSING transition once cancellation is visible.
    let chunk = f.chunks.get(f.job.id, 0).await.unwrap().unwrap();
    assert_eq!(chunk.status, ChunkStatus::Pending);
    assert_eq!(chunk.attempt_count, 0);
}

#[tokio::test]
async fn given_cancel_during_inflight_call_when_driving_then_result_discarded() {
    let f = fixture().await;
    let provider = ScriptedProvider::new(|_| transcription(vec![seg(0.0, 119.0, "finished")]))
        .cancelling_job_on_call(Arc::clone(&f.jobs), f.job.id, 0);

    let result = f
        .driver
        .run_chunk(&provider, f.job.id, &f.planned, b"wav", request())
        .await;

    assert!(matches!(result, Err(ChunkDriveError::Cancelled)));

    let chunk = f.chunks.get(f.job.id, 0).await.unwrap().unwrap();
    assert_ne!(chunk.status, ChunkStatus::Completed);
}

#[test]
fn given_empty_segments_when_measuring_coverage_then_gap_is_full_duration() {
    assert_eq!(coverage_gap(&[], 120.0), 120.0);
}

#[test]
fn given_overflowing_timestamps_when_measuring_coverage_then_clipped_to_duration() {
    // Timestamps drifted past the audio length; the end gap must be computed
    // against the clipped coverage, not the raw overflowing value.
    let segments = vec![
        Segment::new(0.5, 60.0, "a"),
        Segment::new(60.0, 140.0, "drifted"),
    ];
    let gap = coverage_gap(&segments, 120.0);
    assert_eq!(gap, 0.5);
}

#[test]
fn given_tail_truncation_when_measuring_coverage_then_end_gap_reported() {
    let segments = vec![Segment::new(1.0, 80.0, "stops early")];
    assert_eq!(coverage_gap(&segments, 120.0), 40.0);
}
