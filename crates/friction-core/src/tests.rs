use crate::{
    labels, meta_keys, secs_to_duration, ActivationMap, Extent, ExtentBuckets, FrictionCategory,
    Metric, ResponsePattern, Signal, SignalCategory, SignalError, SignalWindow, WindowConfig,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::seq::SliceRandom;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn duration(secs_offset: i64, value: f64) -> Signal {
    Signal::numeric(Metric::StepDuration, at(secs_offset), value)
}

#[test]
fn negative_duration_is_rejected_and_window_unchanged() {
    let mut window = SignalWindow::new(WindowConfig::default());
    window.record(duration(0, 4.0)).unwrap();
    let before = window.len();

    let err = window.record(duration(1, -3.0)).unwrap_err();
    assert!(matches!(err, SignalError::Negative { metric: Metric::StepDuration, .. }));
    assert_eq!(window.len(), before);
}

#[test]
fn malformed_signals_are_rejected() {
    let mut window = SignalWindow::new(WindowConfig::default());

    let wrong_kind = Signal::categorical(Metric::StepDuration, at(0), "slow");
    assert_eq!(
        window.record(wrong_kind).unwrap_err(),
        SignalError::ExpectedNumeric(Metric::StepDuration)
    );

    let unknown_label = Signal::categorical(Metric::RenderAttempt, at(0), "maybe");
    assert!(matches!(
        window.record(unknown_label).unwrap_err(),
        SignalError::UnknownLabel { .. }
    ));

    let mut mismatched = Signal::numeric(Metric::IdleGap, at(0), 3.0);
    mismatched.category = SignalCategory::Access;
    assert!(matches!(
        window.record(mismatched).unwrap_err(),
        SignalError::CategoryMismatch { .. }
    ));

    let no_context = Signal::categorical(Metric::TransferOutcome, at(0), labels::CORRECT);
    assert!(matches!(
        window.record(no_context).unwrap_err(),
        SignalError::MissingMetadata { .. }
    ));

    let bad_secs = Signal::categorical(Metric::AnswerOutcome, at(0), labels::CORRECT)
        .with_meta(meta_keys::RESPONSE_SECS, "soon");
    assert!(matches!(
        window.record(bad_secs).unwrap_err(),
        SignalError::InvalidMetadata { .. }
    ));

    let nan = Signal::numeric(Metric::NetworkLatency, at(0), f64::NAN);
    assert!(matches!(
        window.record(nan).unwrap_err(),
        SignalError::NonFinite { .. }
    ));

    assert!(window.is_empty());
}

#[test]
fn capacity_evicts_oldest_per_category() {
    let mut window = SignalWindow::new(WindowConfig {
        capacity_per_category: 3,
        retention_secs: 10_000.0,
    });
    for i in 0..5 {
        window.record(duration(i, i as f64)).unwrap();
    }
    window
        .record(Signal::numeric(Metric::IdleGap, at(5), 1.0))
        .unwrap();

    let kept: Vec<f64> = window
        .view(SignalCategory::CognitiveLoad, None)
        .filter_map(|s| s.value.as_numeric())
        .collect();
    assert_eq!(kept, vec![2.0, 3.0, 4.0]);
    assert_eq!(window.count(SignalCategory::Motivation), 1);
}

#[test]
fn age_span_evicts_and_rejects_stale() {
    let mut window = SignalWindow::new(WindowConfig {
        capacity_per_category: 100,
        retention_secs: 60.0,
    });
    window.record(duration(0, 1.0)).unwrap();
    window.record(duration(30, 1.0)).unwrap();
    window.record(duration(100, 1.0)).unwrap();

    assert_eq!(window.count(SignalCategory::CognitiveLoad), 1);
    assert_eq!(window.cutoff(), Some(at(40)));

    let err = window.record(duration(20, 1.0)).unwrap_err();
    assert!(matches!(err, SignalError::Stale { .. }));
    assert_eq!(window.len(), 1);
}

#[test]
fn oversized_age_span_keeps_everything() {
    let mut window = SignalWindow::new(WindowConfig {
        capacity_per_category: 4,
        retention_secs: 1e13,
    });
    window.record(duration(0, 2.0)).unwrap();
    window.record(duration(5, 2.0)).unwrap();

    assert_eq!(window.cutoff(), None);
    assert_eq!(window.len(), 2);
    assert_eq!(window.view_metric(Metric::StepDuration, secs_to_duration(1e13)).count(), 2);

    // capacity still bounds the lane
    for i in 0..6 {
        window.record(duration(10 + i, 2.0)).unwrap();
    }
    assert_eq!(window.len(), 4);
}

#[test]
fn view_is_ascending_and_restartable() {
    let mut offsets: Vec<i64> = (0..20).collect();
    offsets.shuffle(&mut rand::thread_rng());

    let mut window = SignalWindow::new(WindowConfig::default());
    for offset in &offsets {
        window.record(duration(*offset, *offset as f64)).unwrap();
    }

    let view = window.view(SignalCategory::CognitiveLoad, None);
    let first: Vec<_> = view.clone().map(|s| s.timestamp).collect();
    let second: Vec<_> = view.map(|s| s.timestamp).collect();
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(first.len(), 20);
}

#[test]
fn span_and_metric_filters() {
    let mut window = SignalWindow::new(WindowConfig::default());
    for i in 0..10 {
        window.record(duration(i * 10, 1.0)).unwrap();
        window
            .record(Signal::numeric(Metric::HintUsed, at(i * 10), 1.0))
            .unwrap();
    }

    let recent = window
        .view_metric(Metric::StepDuration, secs_to_duration(25.0))
        .count();
    assert_eq!(recent, 3);

    let latest = window.latest(Metric::HintUsed, 4);
    assert_eq!(latest.len(), 4);
    assert_eq!(latest[0].timestamp, at(60));
    assert_eq!(latest[3].timestamp, at(90));
}

#[test]
fn response_patterns_follow_time_bands() {
    assert_eq!(ResponsePattern::classify(false, 2.0), ResponsePattern::RushedError);
    assert_eq!(ResponsePattern::classify(false, 75.0), ResponsePattern::Struggling);
    assert_eq!(ResponsePattern::classify(true, 4.0), ResponsePattern::ConfidentFast);
    assert_eq!(ResponsePattern::classify(true, 45.0), ResponsePattern::DeliberateCorrect);
    assert_eq!(ResponsePattern::classify(false, 20.0), ResponsePattern::Typical);

    let answer = Signal::categorical(Metric::AnswerOutcome, at(0), labels::INCORRECT)
        .with_meta(meta_keys::RESPONSE_SECS, "3.5");
    assert_eq!(answer.response_pattern(), Some(ResponsePattern::RushedError));
}

#[test]
fn buckets_classify_boundaries_inclusively() {
    let buckets = ExtentBuckets::new(10.0, 30.0, 60.0);
    assert!(buckets.is_ordered());
    assert_eq!(buckets.classify(9.99), Extent::None);
    assert_eq!(buckets.classify(10.0), Extent::Mild);
    assert_eq!(buckets.classify(35.0), Extent::Moderate);
    assert_eq!(buckets.classify(60.0), Extent::Severe);
    assert!(!ExtentBuckets::new(3.0, 2.0, 5.0).is_ordered());
    assert_eq!(Extent::Moderate.escalate(), Extent::Severe);
    assert_eq!(Extent::None.escalate(), Extent::None);
}

#[test]
fn activation_map_serializes_every_category() {
    let mut map = ActivationMap::new();
    map.set(FrictionCategory::CognitiveLoad, true);

    let json = serde_json::to_value(map).unwrap();
    assert_eq!(json["cognitive-load"], true);
    assert_eq!(json["access"], false);
    assert_eq!(json.as_object().unwrap().len(), 5);

    let back: ActivationMap = serde_json::from_value(json).unwrap();
    assert_eq!(back, map);
    assert_eq!(map.active().collect::<Vec<_>>(), vec![FrictionCategory::CognitiveLoad]);
}

#[test]
fn signal_json_shape() {
    let json = serde_json::json!({
        "category": "access",
        "metric": "render-attempt",
        "timestamp": "2026-03-02T09:00:00Z",
        "value": "failure",
        "metadata": { "modality": "video" }
    });
    let signal: Signal = serde_json::from_value(json).unwrap();
    assert!(signal.validate().is_ok());
    assert!(signal.is_label(labels::FAILURE));
    assert_eq!(signal.modality(), Some(crate::Modality::Video));
}
