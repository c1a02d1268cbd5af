use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use crate::domain::{Chunk, Segment, Transcript};

/// Boundary pairing distance between a tail and a head segment, in seconds.
const BOUNDARY_PROXIMITY_SECONDS: f64 = 2.0;
/// Gap at a chunk edge that earns an operator-visible warning.
const EDGE_GAP_WARNING_SECONDS: f64 = 15.0;
/// Inter-segment silence that breaks `full_text` onto a new line.
const PARAGRAPH_GAP_SECONDS: f64 = 1.5;

/// Per-chunk transcription result handed to the merger, with the chunk's
/// absolute boundaries.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub chunk_index: i32,
    pub start_time: f64,
    pub end_time: f64,
    /// Chunk-local timestamps, sorted by start.
    pub segments: Vec<Segment>,
}

impl ChunkResult {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

impl From<&Chunk> for ChunkResult {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_index: chunk.chunk_index,
            start_time: chunk.start_time,
            end_time: chunk.end_time,
            segments: chunk.segments.clone(),
        }
    }
}

/// Stitches per-chunk segment lists into one gap-free transcript. Chunks
/// deliberately overlap, so consecutive results are deduplicated by text
/// similarity at the boundary.
pub struct TranscriptMerger {
    similarity_threshold: f64,
}

impl TranscriptMerger {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    pub fn merge(&self, chunks: &[ChunkResult]) -> Transcript {
        if chunks.is_empty() {
            return Transcript {
                segments: Vec::new(),
                full_text: String::new(),
                warnings: vec!["no chunk results to merge".to_string()],
            };
        }

        let warnings = validate_coverage(chunks);

        let mut merged = to_absolute(&chunks[0]);

        for window in chunks.windows(2) {
            let (prev, next) = (&window[0], &window[1]);
            let head = to_absolute(next);
            self.splice(&mut merged, head, next.start_time, prev.end_time);
        }

        merged.sort_by(|a, b| a.start.total_cmp(&b.start));

        let full_text = build_full_text(&merged);

        Transcript {
            segments: merged,
            full_text,
            warnings,
        }
    }

    /// Appends `incoming` onto `merged`, deduplicating the overlap region
    /// [overlap_start, overlap_end] shared by the two source chunks.
    fn splice(
        &self,
        merged: &mut Vec<Segment>,
        incoming: Vec<Segment>,
        overlap_start: f64,
        overlap_end: f64,
    ) {
        for head in incoming {
            if head.start >= overlap_end {
                merged.push(head);
                continue;
            }

            // Pair against the closest tail segment inside the overlap.
            let tail_index = merged
                .iter()
                .enumerate()
                .filter(|(_, t)| t.end > overlap_start && t.start < overlap_end)
                .filter(|(_, t)| (t.start - head.start).abs() <= BOUNDARY_PROXIMITY_SECONDS)
                .min_by(|(_, a), (_, b)| {
                    (a.start - head.start)
                        .abs()
                        .total_cmp(&(b.start - head.start).abs())
                })
                .map(|(i, _)| i);

            match tail_index {
                Some(i) => {
                    let similarity =
                        trigram_jaccard(&normalize_text(&merged[i].text), &normalize_text(&head.text));
                    if similarity >= self.similarity_threshold {
                        tracing::trace!(
                            similarity,
                            dropped = %head.text,
                            kept = %merged[i].text,
                            "Dropped duplicated overlap segment"
                        );
                        continue;
                    }
                    // Different text in the overlap: keep both, but trim the
                    // tail so segments never visually overlap.
                    if head.start > merged[i].start && merged[i].end > head.start {
                        merged[i].end = head.start;
                    }
                    merged.push(head);
                }
                None => merged.push(head),
            }
        }
    }
}

fn to_absolute(chunk: &ChunkResult) -> Vec<Segment> {
    chunk
        .segments
        .iter()
        .map(|s| Segment {
            start: chunk.start_time + s.start,
            end: chunk.start_time + s.end,
            text: s.text.trim().to_string(),
            speaker: s.speaker.clone(),
        })
        .collect()
}

/// Operator-visibility checks. Coverage retries already ran inside the chunk
/// driver, so these never fail the job.
fn validate_coverage(chunks: &[ChunkResult]) -> Vec<String> {
    let mut warnings = Vec::new();

    for chunk in chunks {
        let Some(first) = chunk.segments.first() else {
            warnings.push(format!(
                "chunk {}: no segments returned for {:.1}s of audio",
                chunk.chunk_index,
                chunk.duration()
            ));
            continue;
        };
        let last = chunk.segments.last().unwrap_or(first);

        if first.start > EDGE_GAP_WARNING_SECONDS {
            warnings.push(format!(
                "chunk {}: provider skipped audio at chunk start ({:.1}s untranscribed)",
                chunk.chunk_index, first.start
            ));
        }
        let tail_gap = chunk.duration() - last.end;
        if tail_gap > EDGE_GAP_WARNING_SECONDS {
            warnings.push(format!(
                "chunk {}: provider stopped early ({:.1}s untranscribed at chunk end)",
                chunk.chunk_index, tail_gap
            ));
        }
    }

    for warning in &warnings {
        tracing::warn!(warning = %warning, "Transcript coverage warning");
    }

    warnings
}

/// Concatenates segment texts with single spaces, breaking onto a new line
/// when the silence between segments exceeds the paragraph gap.
pub fn build_full_text(segments: &[Segment]) -> String {
    let mut out = String::new();

    for (i, segment) in segments.iter().enumerate() {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            let gap = segment.start - segments[i - 1].end;
            if gap > PARAGRAPH_GAP_SECONDS {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        out.push_str(text);
    }

    out
}

/// Lowercased, NFKC-normalized, punctuation stripped, whitespace collapsed.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::new();
    let mut pending_space = false;

    for c in text.nfkc() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if c.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.extend(c.to_lowercase());
        }
        // punctuation and symbols are dropped
    }

    out
}

/// |A∩B| / |A∪B| over character-trigram sets. Language-agnostic: spaces are
/// removed first so scripts without word boundaries compare the same way.
pub fn trigram_jaccard(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);

    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();

    intersection as f64 / union as f64
}

fn trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();

    if chars.is_empty() {
        return HashSet::new();
    }
    if chars.len() < 3 {
        return HashSet::from([chars.iter().collect()]);
    }

    chars.windows(3).map(|w| w.iter().collect()).collect()
}
