use serde::Deserialize;

use crate::domain::Segment;

/// Cap on the stored upstream response excerpt.
pub const RAW_RESPONSE_CAP: usize = 2000;

/// `verbose_json` response shape shared by the OpenAI and Azure Whisper
/// endpoints.
#[derive(Debug, Deserialize)]
pub struct WhisperResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<WhisperSegment>,
    pub duration: Option<f64>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WhisperSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

/// Converts a Whisper response into chunk-local segments. Timestamps come
/// back in seconds already; a response with text but no segment list becomes
/// one segment spanning the chunk.
pub fn segments_from_response(response: &WhisperResponse, chunk_duration: f64) -> Vec<Segment> {
    if response.segments.is_empty() {
        let text = response.text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        return vec![Segment::new(
            0.0,
            response.duration.unwrap_or(chunk_duration),
            text,
        )];
    }

    let mut segments: Vec<Segment> = response
        .segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| Segment::new(s.start, s.end, s.text.trim()))
        .collect();
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}

pub fn truncate_raw(body: &str) -> String {
    if body.len() <= RAW_RESPONSE_CAP {
        return body.to_string();
    }
    let mut cut = RAW_RESPONSE_CAP;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body[..cut].to_string()
}
