use tavush::infrastructure::audio::{parse_silence_log, plan_boundaries, SilenceInterval};

fn silence(start: f64, end: f64) -> SilenceInterval {
    SilenceInterval { start, end }
}

#[test]
fn given_short_audio_when_planning_then_single_chunk() {
    let boundaries = plan_boundaries(120.0, &[], 300.0, 10.0);
    assert_eq!(boundaries, vec![(0.0, 120.0)]);
}

#[test]
fn given_audio_exactly_max_when_planning_then_single_chunk() {
    let boundaries = plan_boundaries(300.0, &[], 300.0, 10.0);
    assert_eq!(boundaries, vec![(0.0, 300.0)]);
}

#[test]
fn given_620s_audio_when_planning_then_three_overlapping_chunks() {
    let boundaries = plan_boundaries(620.0, &[], 300.0, 10.0);

    assert_eq!(boundaries, vec![(0.0, 300.0), (290.0, 600.0), (590.0, 620.0)]);
}

#[test]
fn given_tiny_remainder_when_planning_then_merged_into_predecessor() {
    // 5s of fresh audio past the last split is below overlap + 1s.
    let boundaries = plan_boundaries(305.0, &[], 300.0, 10.0);
    assert_eq!(boundaries, vec![(0.0, 305.0)]);
}

#[test]
fn given_long_audio_when_planning_then_consecutive_chunks_overlap_exactly() {
    let overlap = 5.0;
    let boundaries = plan_boundaries(1000.0, &[], 100.0, overlap);

    assert!(boundaries.len() > 2);
    for pair in boundaries.windows(2) {
        let overlap_actual = pair[0].1 - pair[1].0;
        assert!(
            (overlap_actual - overlap).abs() < 1e-9,
            "expected overlap {} got {}",
            overlap,
            overlap_actual
        );
    }
}

#[test]
fn given_any_duration_when_planning_then_chunks_cover_whole_audio() {
    for duration in [150.0, 250.0, 333.3, 500.0, 1000.0, 12_345.6] {
        let boundaries = plan_boundaries(duration, &[], 100.0, 5.0);

        assert_eq!(boundaries[0].0, 0.0);
        assert_eq!(boundaries.last().unwrap().1, duration);
        for pair in boundaries.windows(2) {
            // next chunk starts strictly inside the previous one: no gaps
            assert!(pair[1].0 < pair[0].1);
        }
        for (start, end) in &boundaries {
            assert!(start < end);
        }
    }
}

#[test]
fn given_silence_near_target_when_planning_then_split_at_silence_midpoint() {
    // midpoint 95.0 sits inside the window [80, 110] around target 100
    let silences = [silence(94.0, 96.0)];
    let boundaries = plan_boundaries(250.0, &silences, 100.0, 5.0);

    assert_eq!(boundaries[0], (0.0, 95.0));
    assert_eq!(boundaries[1].0, 90.0);
}

#[test]
fn given_multiple_silences_when_planning_then_nearest_to_target_wins() {
    let silences = [silence(84.0, 86.0), silence(97.0, 99.0), silence(106.0, 108.0)];
    let boundaries = plan_boundaries(250.0, &silences, 100.0, 5.0);

    // midpoints: 85, 98, 107; nearest to target 100 is 98
    assert_eq!(boundaries[0].1, 98.0);
}

#[test]
fn given_late_chunks_when_planning_then_search_window_stays_fixed_width() {
    // The window must be 0.3*M wide around every target, independent of the
    // chunk's absolute position. A silence 25s before a late target (outside
    // the 20s look-behind for M=100) must be ignored.
    let m = 100.0;
    let o = 5.0;

    // Targets fall at 100, 195, 290, ... ; pick the one near 480.
    let no_silence = plan_boundaries(1000.0, &[], m, o);
    let late_target = no_silence[4].1; // a split chosen with no silences = its target

    let outside = [silence(late_target - 26.0, late_target - 24.0)];
    let with_outside = plan_boundaries(1000.0, &outside, m, o);
    assert_eq!(
        with_outside[4].1, late_target,
        "silence outside the fixed window must not attract the split"
    );

    let inside = [silence(late_target - 16.0, late_target - 14.0)];
    let with_inside = plan_boundaries(1000.0, &inside, m, o);
    assert_eq!(
        with_inside[4].1,
        late_target - 15.0,
        "silence inside the fixed window is used"
    );
}

#[test]
fn given_no_silence_in_window_when_planning_then_split_at_target() {
    let silences = [silence(10.0, 12.0), silence(200.0, 201.0)];
    let boundaries = plan_boundaries(250.0, &silences, 100.0, 5.0);

    assert_eq!(boundaries[0], (0.0, 100.0));
}

#[test]
fn given_ffmpeg_silencedetect_output_when_parsing_then_intervals_extracted() {
    let lines = [
        "[silencedetect @ 0x5617] silence_start: 12.462",
        "frame=  100 fps=0.0 q=-0.0 size=N/A",
        "[silencedetect @ 0x5617] silence_end: 13.521 | silence_duration: 1.059",
        "[silencedetect @ 0x5617] silence_start: 290.1",
        "[silencedetect @ 0x5617] silence_end: 291.3 | silence_duration: 1.2",
    ];

    let intervals = parse_silence_log(lines.into_iter());

    assert_eq!(intervals.len(), 2);
    assert_eq!(intervals[0].start, 12.462);
    assert_eq!(intervals[0].end, 13.521);
    assert!((intervals[1].midpoint() - 290.7).abs() < 1e-9);
}

#[test]
fn given_unterminated_silence_when_parsing_then_ignored() {
    let lines = ["[silencedetect @ 0x1] silence_start: 5.0"];
    let intervals = parse_silence_log(lines.into_iter());
    assert!(intervals.is_empty());
}
