use super::{
    build_tier, parse_predictions, parse_windows, place_predictions, reconstruct_tier, PlacedVot,
    PredictionRecord, WindowSpan,
};
use crate::error::DecodeError;

fn window(id: usize, xmin: f64, xmax: f64) -> WindowSpan {
    WindowSpan { id, xmin, xmax }
}

fn record(window_id: usize, confidence: &str, xmin_ms: f64, xmax_ms: f64) -> PredictionRecord {
    PredictionRecord {
        window_id,
        confidence: confidence.to_string(),
        xmin_ms,
        xmax_ms,
    }
}

fn placed(window_id: usize, xmin: f64, xmax: f64, mark: &str) -> PlacedVot {
    PlacedVot {
        window_id,
        xmin,
        xmax,
        mark: mark.to_string(),
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn positive_vot_keeps_confidence_label() {
    let windows = vec![window(0, 1.25, 2.0)];
    let predictions = vec![record(0, "0.8731", 5.0, 120.0)];

    let result = place_predictions(&windows, &predictions).expect("placed");

    assert_close(result[0].xmin, 1.255);
    assert_close(result[0].xmax, 1.370);
    assert_eq!(result[0].mark, "0.8731");
}

#[test]
fn negative_vot_swaps_bounds_and_prefixes_label() {
    let windows = vec![window(0, 1.25, 2.0)];
    let predictions = vec![record(0, "0.41", 130.0, 10.0)];

    let result = place_predictions(&windows, &predictions).expect("placed");

    assert_close(result[0].xmin, 1.260);
    assert_close(result[0].xmax, 1.380);
    assert_eq!(result[0].mark, "neg 0.41");
}

#[test]
fn equal_offsets_use_negative_convention() {
    let windows = vec![window(0, 0.0, 1.0)];
    let predictions = vec![record(0, "1.0", 40.0, 40.0)];

    let result = place_predictions(&windows, &predictions).expect("placed");

    assert_eq!(result[0].mark, "neg 1.0");
    assert_close(result[0].xmin, 0.04);
    assert_close(result[0].xmax, 0.04);
}

#[test]
fn count_mismatch_is_an_error() {
    let windows = vec![window(0, 0.0, 1.0), window(1, 1.0, 2.0)];
    let predictions = vec![record(0, "0.5", 5.0, 20.0)];

    let err = place_predictions(&windows, &predictions).expect_err("mismatch");
    assert!(matches!(err, DecodeError::Reconstruct { .. }));
}

#[test]
fn tier_is_contiguous_and_spans_document() {
    let tier = build_tier(
        "AutoVOT",
        0.0,
        3.0,
        vec![
            placed(0, 0.5, 0.6, "0.9"),
            placed(1, 1.2, 1.25, "neg 0.3"),
            placed(2, 2.0, 2.1, "0.7"),
        ],
    )
    .expect("tier");

    let intervals = tier.intervals();
    assert_eq!(intervals.len(), 7);
    assert_close(intervals[0].xmin, 0.0);
    assert_close(intervals.last().expect("last").xmax, 3.0);
    for pair in intervals.windows(2) {
        assert_close(pair[0].xmax, pair[1].xmin);
        assert!(pair[0].xmin <= pair[0].xmax);
    }
    let labels: Vec<&str> = intervals.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(labels, vec!["", "0.9", "", "neg 0.3", "", "0.7", ""]);
}

#[test]
fn single_prediction_yields_three_intervals() {
    let tier = build_tier("AutoVOT", 0.0, 1.0, vec![placed(0, 0.2, 0.3, "0.5")]).expect("tier");

    let labels: Vec<&str> = tier.intervals().iter().map(|i| i.text.as_str()).collect();
    assert_eq!(labels, vec!["", "0.5", ""]);
}

#[test]
fn touching_boundaries_skip_zero_width_fillers() {
    let tier = build_tier(
        "AutoVOT",
        0.0,
        1.0,
        vec![placed(0, 0.0, 0.3, "a"), placed(1, 0.3, 1.0, "b")],
    )
    .expect("tier");

    let labels: Vec<&str> = tier.intervals().iter().map(|i| i.text.as_str()).collect();
    assert_eq!(labels, vec!["a", "b"]);
}

#[test]
fn predictions_are_ordered_by_start() {
    let tier = build_tier(
        "AutoVOT",
        0.0,
        2.0,
        vec![placed(1, 1.2, 1.3, "late"), placed(0, 0.2, 0.3, "early")],
    )
    .expect("tier");

    let labels: Vec<&str> = tier.labeled().map(|i| i.text.as_str()).collect();
    assert_eq!(labels, vec!["early", "late"]);
}

#[test]
fn overlapping_predictions_are_rejected() {
    let err = build_tier(
        "AutoVOT",
        0.0,
        2.0,
        vec![placed(0, 0.2, 0.5, "a"), placed(1, 0.4, 0.6, "b")],
    )
    .expect_err("overlap");
    assert!(err.to_string().contains("overlaps"));
}

#[test]
fn predictions_outside_document_are_rejected() {
    assert!(build_tier("AutoVOT", 0.5, 2.0, vec![placed(0, 0.2, 0.3, "a")]).is_err());
    assert!(build_tier("AutoVOT", 0.0, 2.0, vec![placed(0, 1.9, 2.3, "a")]).is_err());
}

#[test]
fn zero_predictions_are_an_error() {
    let err = build_tier("AutoVOT", 0.0, 1.0, Vec::new()).expect_err("empty");
    assert!(matches!(err, DecodeError::NoPredictions));
}

#[test]
fn window_file_uses_second_and_third_fields() {
    let contents = "a.wav 0.120000 0.920000 0.170000 0.240000\n\nb.wav 1.5 2.5 1.55 1.6\n";

    let windows = parse_windows(contents).expect("windows");

    assert_eq!(windows, vec![window(0, 0.12, 0.92), window(1, 1.5, 2.5)]);
}

#[test]
fn quoted_window_path_may_contain_spaces() {
    let contents = concat!(
        "\"/corpus/speaker 1/a.wav\" 0.45 1.35 0.5 0.56\n",
        "\"/corpus/say \"\"pa\"\".wav\" 2 3 2.05 2.1\n",
    );

    let windows = parse_windows(contents).expect("windows");

    assert_eq!(windows, vec![window(0, 0.45, 1.35), window(1, 2.0, 3.0)]);
}

#[test]
fn unterminated_quoted_path_is_rejected() {
    let err = parse_windows("a.wav 0 1 0 1\n\"/corpus/a.wav 0 1 0 1\n").expect_err("open quote");
    match err {
        DecodeError::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_prediction_line_reports_line_number() {
    let err = parse_predictions("0.9 5 120\n0.8 12\n").expect_err("short line");
    match err {
        DecodeError::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn prediction_confidence_must_be_numeric() {
    assert!(parse_predictions("high 5 120\n").is_err());
}

#[test]
fn reconstruct_from_file_contents() {
    let window_file = "a.wav 0.5 1.3 0.5 1.3\na.wav 2.0 2.8 2.0 2.8\n";
    let prediction_file = "0.812 12 85\n-0.204 140 20\n";

    let tier = reconstruct_tier("AutoVOT", 0.0, 4.0, window_file, prediction_file).expect("tier");

    let labeled: Vec<_> = tier.labeled().collect();
    assert_eq!(labeled.len(), 2);
    assert_eq!(labeled[0].text, "0.812");
    assert_close(labeled[0].xmin, 0.512);
    assert_close(labeled[0].xmax, 0.585);
    assert_eq!(labeled[1].text, "neg -0.204");
    assert_close(labeled[1].xmin, 2.02);
    assert_close(labeled[1].xmax, 2.14);
    assert_eq!(tier.name(), "AutoVOT");
}

#[test]
fn reconstruct_with_empty_prediction_file_fails() {
    let err = reconstruct_tier("AutoVOT", 0.0, 4.0, "a.wav 0.5 1.3 0.5 1.3\n", "\n")
        .expect_err("no predictions");
    assert!(matches!(err, DecodeError::NoPredictions));
}
