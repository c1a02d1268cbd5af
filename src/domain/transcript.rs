use serde::{Deserialize, Serialize};

use super::Segment;

/// Merged transcript: absolute-timestamped segments plus the flattened text.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    pub full_text: String,
    /// Operator-visibility notes from post-merge validation; never fatal.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptBody {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

/// The JSON document persisted at `jobs/{job_id}/result/transcript.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub job_id: String,
    pub duration_seconds: f64,
    pub provider_used: String,
    pub processing_time_seconds: f64,
    pub chunks_processed: u32,
    pub transcript: TranscriptBody,
}

impl TranscriptDocument {
    pub fn from_transcript(
        job_id: String,
        duration_seconds: f64,
        provider_used: String,
        processing_time_seconds: f64,
        chunks_processed: u32,
        transcript: &Transcript,
    ) -> Self {
        Self {
            job_id,
            duration_seconds,
            provider_used,
            processing_time_seconds,
            chunks_processed,
            transcript: TranscriptBody {
                text: transcript.full_text.clone(),
                segments: transcript
                    .segments
                    .iter()
                    .map(|s| TranscriptSegment {
                        start: s.start,
                        end: s.end,
                        text: s.text.clone(),
                        speaker: s.speaker.clone(),
                    })
                    .collect(),
            },
        }
    }
}
