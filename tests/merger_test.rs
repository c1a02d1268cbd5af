use tavush::application::services::{
    build_full_text, normalize_text, trigram_jaccard, ChunkResult, TranscriptMerger,
};
use tavush::domain::Segment;

fn merger() -> TranscriptMerger {
    TranscriptMerger::new(0.8)
}

fn chunk(index: i32, start: f64, end: f64, segments: Vec<Segment>) -> ChunkResult {
    ChunkResult {
        chunk_index: index,
        start_time: start,
        end_time: end,
        segments,
    }
}

#[test]
fn given_no_chunks_when_merging_then_empty_transcript_with_warning() {
    let transcript = merger().merge(&[]);

    assert!(transcript.segments.is_empty());
    assert_eq!(transcript.full_text, "");
    assert_eq!(transcript.warnings.len(), 1);
}

#[test]
fn given_single_chunk_when_merging_then_segments_pass_through_unchanged() {
    let segments = vec![
        Segment::new(0.0, 4.5, "Hello there"),
        Segment::new(4.5, 9.0, "and welcome back"),
    ];
    let transcript = merger().merge(&[chunk(0, 0.0, 30.0, segments.clone())]);

    assert_eq!(transcript.segments, segments);
    assert_eq!(transcript.full_text, "Hello there and welcome back");
    assert!(transcript.warnings.is_empty());
}

#[test]
fn given_two_chunks_when_merging_then_timestamps_become_absolute() {
    let first = chunk(0, 0.0, 300.0, vec![Segment::new(0.0, 5.0, "first")]);
    let second = chunk(1, 290.0, 600.0, vec![Segment::new(15.0, 20.0, "second")]);

    let transcript = merger().merge(&[first, second]);

    assert_eq!(transcript.segments[0].start, 0.0);
    assert_eq!(transcript.segments[1].start, 305.0);
    assert_eq!(transcript.segments[1].end, 310.0);
}

#[test]
fn given_identical_overlap_when_merging_then_duplicate_emitted_once() {
    // Chunk 0 ends with a segment inside the overlap [290, 300]; chunk 1
    // transcribed the same audio with the same text.
    let first = chunk(
        0,
        0.0,
        300.0,
        vec![
            Segment::new(280.0, 291.0, "the quarterly numbers look strong"),
            Segment::new(291.0, 299.0, "so we should increase the budget"),
        ],
    );
    let second = chunk(
        1,
        290.0,
        600.0,
        vec![
            Segment::new(1.0, 9.0, "so we should increase the budget"),
            Segment::new(9.0, 15.0, "starting next month"),
        ],
    );

    let transcript = merger().merge(&[first, second]);

    let budget_count = transcript
        .segments
        .iter()
        .filter(|s| s.text.contains("increase the budget"))
        .count();
    assert_eq!(budget_count, 1);
    // non-overlap segments survive verbatim
    assert!(transcript
        .segments
        .iter()
        .any(|s| s.text == "the quarterly numbers look strong"));
    assert!(transcript
        .segments
        .iter()
        .any(|s| s.text == "starting next month"));
}

#[test]
fn given_duplicated_boundary_text_when_merging_then_full_text_contains_it_once() {
    let first = chunk(
        0,
        0.0,
        20.0,
        vec![Segment::new(9.5, 12.0, "hello world,")],
    );
    let second = chunk(
        1,
        10.0,
        30.0,
        vec![
            Segment::new(1.0, 3.0, "hello world,"),
            Segment::new(3.0, 6.0, "how are you"),
        ],
    );

    let transcript = merger().merge(&[first, second]);

    assert_eq!(transcript.full_text.matches("hello world").count(), 1);
    assert!(transcript.full_text.contains("how are you"));
}

#[test]
fn given_different_overlap_text_when_merging_then_tail_truncated_not_dropped() {
    let first = chunk(
        0,
        0.0,
        20.0,
        vec![Segment::new(9.0, 14.0, "completely different words")],
    );
    let second = chunk(
        1,
        10.0,
        30.0,
        vec![Segment::new(0.5, 4.0, "nothing alike here at all")],
    );

    let transcript = merger().merge(&[first, second]);

    assert_eq!(transcript.segments.len(), 2);
    // tail end trimmed to the head start (10.5 absolute)
    assert_eq!(transcript.segments[0].end, 10.5);
    assert_eq!(transcript.segments[0].text, "completely different words");
}

#[test]
fn given_long_silence_between_segments_when_building_text_then_newline_inserted() {
    let segments = vec![
        Segment::new(0.0, 2.0, "First thought."),
        Segment::new(2.5, 4.0, "Same breath."),
        Segment::new(10.0, 12.0, "New paragraph."),
    ];

    let text = build_full_text(&segments);

    assert_eq!(text, "First thought. Same breath.\nNew paragraph.");
}

#[test]
fn given_provider_skipped_chunk_start_when_merging_then_warning_emitted() {
    let late = chunk(0, 0.0, 120.0, vec![Segment::new(40.0, 50.0, "late start")]);

    let transcript = merger().merge(&[late]);

    assert!(transcript
        .warnings
        .iter()
        .any(|w| w.contains("skipped audio at chunk start")));
}

#[test]
fn given_provider_stopped_early_when_merging_then_warning_emitted() {
    let early = chunk(0, 0.0, 120.0, vec![Segment::new(0.0, 30.0, "short")]);

    let transcript = merger().merge(&[early]);

    assert!(transcript.warnings.iter().any(|w| w.contains("stopped early")));
}

#[test]
fn given_case_and_punctuation_noise_when_normalizing_then_texts_compare_equal() {
    let a = normalize_text("Hello,   World!");
    let b = normalize_text("hello world");

    assert_eq!(a, b);
    assert!((trigram_jaccard(&a, &b) - 1.0).abs() < 1e-9);
}

#[test]
fn given_unrelated_texts_when_comparing_then_similarity_low() {
    let a = normalize_text("the quick brown fox");
    let b = normalize_text("entirely unrelated sentence");

    assert!(trigram_jaccard(&a, &b) < 0.2);
}

#[test]
fn given_very_short_text_when_comparing_then_no_panic() {
    assert!(trigram_jaccard("ab", "ab") > 0.99);
    assert_eq!(trigram_jaccard("", "abc"), 0.0);
}
