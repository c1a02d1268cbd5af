#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tavush::application::ports::{
    AudioChunker, AudioError, AudioNormalizer, ChunkTranscription, JobRepository,
    NormalizedAudio, PlannedChunk, ProviderError, SttProvider, TranscriptionRequest,
};
use tavush::domain::{Job, JobId, JobStatus, ProviderMetadata, Segment};

pub fn seg(start: f64, end: f64, text: &str) -> Segment {
    Segment::new(start, end, text)
}

pub fn transcription(segments: Vec<Segment>) -> Result<ChunkTranscription, ProviderError> {
    Ok(ChunkTranscription {
        segments,
        metadata: ProviderMetadata::default(),
    })
}

type Script = Box<dyn Fn(u32) -> Result<ChunkTranscription, ProviderError> + Send + Sync>;

/// Provider stub scripted per call index. Optionally cancels the job in the
/// store while a given call is in flight, to exercise the mid-call
/// cancellation path.
pub struct ScriptedProvider {
    script: Script,
    calls: AtomicU32,
    cancel_hook: Option<(Arc<dyn JobRepository>, JobId, u32)>,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(u32) -> Result<ChunkTranscription, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicU32::new(0),
            cancel_hook: None,
        }
    }

    pub fn cancelling_job_on_call(
        mut self,
        jobs: Arc<dyn JobRepository>,
        job_id: JobId,
        call_index: u32,
    ) -> Self {
        self.cancel_hook = Some((jobs, job_id, call_index));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SttProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn transcribe(
        &self,
        _audio: &[u8],
        _request: &TranscriptionRequest,
    ) -> Result<ChunkTranscription, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((jobs, job_id, at_call)) = &self.cancel_hook {
            if call == *at_call {
                jobs.transition(
                    *job_id,
                    &[JobStatus::Pending, JobStatus::Uploaded, JobStatus::Processing],
                    JobStatus::Cancelled,
                )
                .await
                .ok();
            }
        }

        (self.script)(call)
    }
}

/// Normalizer stub: copies the input and reports a configured duration.
pub struct StubNormalizer {
    pub duration_seconds: f64,
}

#[async_trait]
impl AudioNormalizer for StubNormalizer {
    async fn normalize(
        &self,
        input: &Path,
        _extension: &str,
        out_dir: &Path,
    ) -> Result<NormalizedAudio, AudioError> {
        let wav_path = out_dir.join("normalized.wav");
        tokio::fs::copy(input, &wav_path).await?;
        Ok(NormalizedAudio {
            wav_path,
            duration_seconds: self.duration_seconds,
        })
    }
}

/// Chunker stub emitting fixed boundaries, each backed by a copy of the
/// normalized file.
pub struct StubChunker {
    pub boundaries: Vec<(f64, f64)>,
}

#[async_trait]
impl AudioChunker for StubChunker {
    async fn split(
        &self,
        wav: &Path,
        _duration: f64,
        out_dir: &Path,
    ) -> Result<Vec<PlannedChunk>, AudioError> {
        let mut planned = Vec::new();
        for (index, (start, end)) in self.boundaries.iter().enumerate() {
            let path = out_dir.join(format!("chunk_{:04}.wav", index));
            tokio::fs::copy(wav, &path).await?;
            planned.push(PlannedChunk {
                index: index as i32,
                start: *start,
                end: *end,
                wav_path: path,
            });
        }
        Ok(planned)
    }
}

/// Polls the store until the job reaches `expected` or the deadline passes.
pub async fn wait_for_status(
    jobs: &Arc<dyn JobRepository>,
    job_id: JobId,
    expected: JobStatus,
    deadline: Duration,
) -> Job {
    let poll = async {
        loop {
            if let Ok(Some(job)) = jobs.get_by_id(job_id).await {
                if job.status == expected {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };

    tokio::time::timeout(deadline, poll)
        .await
        .unwrap_or_else(|_| panic!("job never reached {}", expected))
}
