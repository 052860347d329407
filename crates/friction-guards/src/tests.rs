use crate::{cognitive_load, interaction, motivation, transfer, AccessEnvelope, FrictionGuards};
use friction_core::{
    labels, meta_keys, Extent, FrictionCategory, Metric, Modality, Signal, SignalWindow,
    WindowConfig,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

fn window_of(signals: Vec<Signal>) -> SignalWindow {
    let mut window = SignalWindow::new(WindowConfig::default());
    for signal in signals {
        window.record(signal).unwrap();
    }
    window
}

fn step(offset: i64, secs: f64) -> Signal {
    Signal::numeric(Metric::StepDuration, at(offset), secs)
}

fn answer(offset: i64, step: &str, correct: bool, response_secs: f64) -> Signal {
    let label = if correct { labels::CORRECT } else { labels::INCORRECT };
    Signal::categorical(Metric::AnswerOutcome, at(offset), label)
        .with_meta(meta_keys::STEP, step)
        .with_meta(meta_keys::RESPONSE_SECS, response_secs.to_string())
}

fn render(offset: i64, modality: Modality, ok: bool) -> Signal {
    let label = if ok { labels::SUCCESS } else { labels::FAILURE };
    Signal::categorical(Metric::RenderAttempt, at(offset), label)
        .with_meta(meta_keys::MODALITY, modality.as_str())
}

fn transfer(offset: i64, context: &str, correct: bool) -> Signal {
    let label = if correct { labels::CORRECT } else { labels::INCORRECT };
    Signal::categorical(Metric::TransferOutcome, at(offset), label)
        .with_meta(meta_keys::CONTEXT, context)
}

fn timed_transfer(offset: i64, context: &str, correct: bool, response_secs: f64) -> Signal {
    transfer(offset, context, correct).with_meta(meta_keys::RESPONSE_SECS, response_secs.to_string())
}

fn hint(offset: i64) -> Signal {
    Signal::numeric(Metric::HintUsed, at(offset), 1.0)
}

#[test]
fn empty_window_activates_nothing() {
    let guards = FrictionGuards::default();
    let window = SignalWindow::new(WindowConfig::default());
    assert!(!guards.detect_all(&window).any());
}

#[test]
fn categories_without_samples_stay_inactive() {
    let guards = FrictionGuards::default();
    // heavy evidence for cognitive load and interaction only
    let mut signals: Vec<Signal> = (0..5).map(|i| step(i, 80.0)).collect();
    signals.extend((0..5).map(|i| answer(10 + i, "s1", false, 2.0)));
    let window = window_of(signals);

    let map = guards.detect_all(&window);
    assert!(map.get(FrictionCategory::CognitiveLoad));
    assert!(map.get(FrictionCategory::InteractionFeedback));
    assert!(!map.get(FrictionCategory::Access));
    assert!(!map.get(FrictionCategory::TransferMeaning));
}

#[test]
fn short_steps_do_not_activate_cognitive_load() {
    let guards = FrictionGuards::default();
    let window = window_of((0..5).map(|i| step(i * 3, 2.0)).collect());
    assert!(!guards.detect(FrictionCategory::CognitiveLoad, &window));
}

#[test]
fn long_steps_activate_cognitive_load_at_moderate() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![step(0, 35.0), step(40, 40.0), step(85, 45.0)]);

    assert!(guards.detect(FrictionCategory::CognitiveLoad, &window));
    let profile = guards
        .diagnose(FrictionCategory::CognitiveLoad, &window)
        .unwrap();
    assert_eq!(profile.extent, Extent::Moderate);
    assert_eq!(profile.cause_hint, cognitive_load::CAUSE_SLOW_STEPS);
    assert!(profile.affected_modalities.contains(&Modality::Text));
}

#[test]
fn one_fast_step_breaks_the_slow_pattern() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![step(0, 35.0), step(40, 4.0), step(85, 45.0)]);
    assert!(!guards.detect(FrictionCategory::CognitiveLoad, &window));
}

#[test]
fn hint_dependency_escalates_extent() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        step(0, 35.0),
        step(40, 40.0),
        step(85, 45.0),
        Signal::numeric(Metric::HintUsed, at(50), 1.0),
        Signal::numeric(Metric::HintUsed, at(90), 1.0),
    ]);
    let profile = guards
        .diagnose(FrictionCategory::CognitiveLoad, &window)
        .unwrap();
    assert_eq!(profile.extent, Extent::Severe);
    assert_eq!(profile.cause_hint, cognitive_load::CAUSE_HINT_DEPENDENCY);
}

#[test]
fn rising_step_times_activate_cognitive_load() {
    let guards = FrictionGuards::default();
    // mean stays under the slow-step threshold, the last step does not
    let window = window_of(vec![step(0, 4.0), step(10, 5.0), step(20, 12.0)]);

    assert!(guards.detect(FrictionCategory::CognitiveLoad, &window));
    let profile = guards
        .diagnose(FrictionCategory::CognitiveLoad, &window)
        .unwrap();
    assert_eq!(profile.extent, Extent::Mild);
    assert_eq!(profile.cause_hint, cognitive_load::CAUSE_RISING_TIMES);

    // the newest step has to be slow, not just slower
    let quick = window_of(vec![step(0, 2.0), step(10, 3.0), step(20, 6.0)]);
    assert!(!guards.detect(FrictionCategory::CognitiveLoad, &quick));
}

#[test]
fn access_names_the_failing_modality() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        render(0, Modality::Text, true),
        render(1, Modality::Video, false),
        render(2, Modality::Text, true),
        render(3, Modality::Video, false),
        render(4, Modality::Text, true),
    ]);

    assert!(guards.detect(FrictionCategory::Access, &window));
    let profile = guards.diagnose(FrictionCategory::Access, &window).unwrap();
    assert_eq!(profile.extent, Extent::Severe);
    assert_eq!(
        profile.affected_modalities.into_iter().collect::<Vec<_>>(),
        vec![Modality::Video]
    );
}

#[test]
fn access_falls_back_to_latency() {
    let guards = FrictionGuards::default();
    let window = window_of(
        (0..3)
            .map(|i| Signal::numeric(Metric::NetworkLatency, at(i), 1.2))
            .collect(),
    );

    assert!(guards.detect(FrictionCategory::Access, &window));
    let profile = guards.diagnose(FrictionCategory::Access, &window).unwrap();
    assert_eq!(profile.extent, Extent::Moderate);
    assert_eq!(profile.cause_hint, "high-latency");
}

#[test]
fn access_abstains_without_discriminating_data() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        Signal::categorical(Metric::RenderAttempt, at(0), labels::FAILURE),
        Signal::categorical(Metric::RenderAttempt, at(1), labels::FAILURE),
    ]);

    assert!(guards.detect(FrictionCategory::Access, &window));
    let profile = guards.diagnose(FrictionCategory::Access, &window).unwrap();
    assert_eq!(profile.extent, Extent::None);
    assert!(!profile.is_actionable());
}

#[test]
fn repeated_errors_on_one_step() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        answer(0, "s3", false, 20.0),
        answer(30, "s3", false, 25.0),
        answer(60, "s3", true, 22.0),
    ]);

    assert!(guards.detect(FrictionCategory::InteractionFeedback, &window));
    let profile = guards
        .diagnose(FrictionCategory::InteractionFeedback, &window)
        .unwrap();
    assert_eq!(profile.cause_hint, interaction::CAUSE_REPEATED_STEP);
    assert_eq!(profile.extent, Extent::Severe);
}

#[test]
fn rushed_errors_across_steps() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        answer(0, "s1", false, 2.0),
        answer(10, "s2", true, 12.0),
        answer(20, "s3", false, 3.0),
        answer(30, "s4", true, 15.0),
        answer(40, "s5", true, 18.0),
    ]);

    assert!(guards.detect(FrictionCategory::InteractionFeedback, &window));
    let profile = guards
        .diagnose(FrictionCategory::InteractionFeedback, &window)
        .unwrap();
    assert_eq!(profile.cause_hint, interaction::CAUSE_RUSHED);
    assert_eq!(profile.extent, Extent::Moderate);
}

#[test]
fn motivation_needs_a_pattern_not_one_event() {
    let guards = FrictionGuards::default();
    let single = window_of(vec![Signal::numeric(Metric::IdleGap, at(0), 120.0)]);
    assert!(!guards.detect(FrictionCategory::RegulationMotivation, &single));

    let pattern = window_of(vec![
        Signal::numeric(Metric::IdleGap, at(0), 120.0),
        Signal::categorical(Metric::Disengagement, at(30), labels::SKIP),
        Signal::numeric(Metric::IdleGap, at(60), 12.0),
    ]);
    assert!(guards.detect(FrictionCategory::RegulationMotivation, &pattern));
    let profile = guards
        .diagnose(FrictionCategory::RegulationMotivation, &pattern)
        .unwrap();
    assert!(profile.is_actionable());
    assert!((profile.score - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn errors_right_after_hints_count_for_motivation() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        answer(0, "s1", true, 20.0),
        hint(5),
        answer(10, "s1", false, 20.0),
        answer(40, "s2", true, 20.0),
        hint(45),
        answer(50, "s2", false, 25.0),
    ]);

    assert!(guards.detect(FrictionCategory::RegulationMotivation, &window));
    let profile = guards
        .diagnose(FrictionCategory::RegulationMotivation, &window)
        .unwrap();
    assert_eq!(profile.cause_hint, motivation::CAUSE_ERRORS_AFTER_HINTS);
    assert!(profile.is_actionable());

    // a hint followed by a correct answer, then an unrelated error
    let recovered = window_of(vec![
        hint(0),
        answer(10, "s1", true, 20.0),
        answer(40, "s2", false, 20.0),
        answer(50, "s3", false, 25.0),
    ]);
    assert!(!guards.detect(FrictionCategory::RegulationMotivation, &recovered));

    let mut off = FrictionGuards::default();
    off.regulation_motivation.errors_after_hints = false;
    assert!(!off.detect(FrictionCategory::RegulationMotivation, &window));
}

#[test]
fn slow_novel_answers_activate_transfer() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        timed_transfer(0, labels::FAMILIAR, true, 10.0),
        timed_transfer(1, labels::FAMILIAR, true, 12.0),
        timed_transfer(2, labels::NOVEL, true, 30.0),
        timed_transfer(3, labels::NOVEL, true, 28.0),
    ]);

    assert!(guards.detect(FrictionCategory::TransferMeaning, &window));
    let profile = guards
        .diagnose(FrictionCategory::TransferMeaning, &window)
        .unwrap();
    assert_eq!(profile.extent, Extent::Mild);
    assert_eq!(profile.cause_hint, transfer::CAUSE_NOVEL_SLOWDOWN);

    // under twice the familiar mean
    let steady = window_of(vec![
        timed_transfer(0, labels::FAMILIAR, true, 10.0),
        timed_transfer(1, labels::FAMILIAR, true, 12.0),
        timed_transfer(2, labels::NOVEL, true, 18.0),
        timed_transfer(3, labels::NOVEL, true, 20.0),
    ]);
    assert!(!guards.detect(FrictionCategory::TransferMeaning, &steady));

    // slowdown on top of the accuracy drop raises the extent
    let both = window_of(vec![
        timed_transfer(0, labels::FAMILIAR, true, 10.0),
        timed_transfer(1, labels::FAMILIAR, true, 10.0),
        timed_transfer(2, labels::FAMILIAR, true, 10.0),
        timed_transfer(3, labels::FAMILIAR, false, 10.0),
        timed_transfer(4, labels::NOVEL, false, 40.0),
        timed_transfer(5, labels::NOVEL, true, 40.0),
        timed_transfer(6, labels::NOVEL, false, 40.0),
    ]);
    let profile = guards
        .diagnose(FrictionCategory::TransferMeaning, &both)
        .unwrap();
    assert_eq!(profile.cause_hint, transfer::CAUSE_NOVEL_DROP);
    assert_eq!(profile.extent, Extent::Moderate);
}

#[test]
fn transfer_drop_between_contexts() {
    let guards = FrictionGuards::default();
    let window = window_of(vec![
        transfer(0, labels::FAMILIAR, true),
        transfer(1, labels::FAMILIAR, true),
        transfer(2, labels::FAMILIAR, true),
        transfer(3, labels::NOVEL, false),
        transfer(4, labels::NOVEL, false),
    ]);

    assert!(guards.detect(FrictionCategory::TransferMeaning, &window));
    let profile = guards
        .diagnose(FrictionCategory::TransferMeaning, &window)
        .unwrap();
    assert_eq!(profile.extent, Extent::Severe);

    let borderline = window_of(vec![
        transfer(0, labels::FAMILIAR, true),
        transfer(1, labels::FAMILIAR, true),
        transfer(2, labels::FAMILIAR, false),
        transfer(3, labels::NOVEL, false),
        transfer(4, labels::NOVEL, false),
    ]);
    assert!(!guards.detect(FrictionCategory::TransferMeaning, &borderline));
}

fn random_window(rng: &mut impl Rng) -> SignalWindow {
    let mut window = SignalWindow::new(WindowConfig::default());
    for i in 0..rng.gen_range(0..40) {
        let offset = i as i64 * 5;
        let signal = match rng.gen_range(0..7) {
            0 => step(offset, rng.gen_range(0.0..90.0)),
            1 => answer(offset, &format!("s{}", rng.gen_range(0..3)), rng.gen_bool(0.5), rng.gen_range(0.0..80.0)),
            2 => render(offset, Modality::ALL[rng.gen_range(0..3)], rng.gen_bool(0.6)),
            3 => Signal::numeric(Metric::NetworkLatency, at(offset), rng.gen_range(0.0..2.5)),
            4 => Signal::numeric(Metric::IdleGap, at(offset), rng.gen_range(0.0..200.0)),
            5 => transfer(offset, if rng.gen_bool(0.5) { labels::FAMILIAR } else { labels::NOVEL }, rng.gen_bool(0.5)),
            _ => Signal::numeric(Metric::HintUsed, at(offset), 1.0),
        };
        window.record(signal).unwrap();
    }
    window
}

#[test]
fn detection_and_diagnosis_are_deterministic() {
    let guards = FrictionGuards::default();
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let window = random_window(&mut rng);
        let copy = window.clone();

        let first = guards.detect_all(&window);
        assert_eq!(first, guards.detect_all(&window));
        assert_eq!(first, guards.detect_all(&copy));

        for category in first.active() {
            let a = guards.diagnose(category, &window);
            let b = guards.diagnose(category, &copy);
            assert_eq!(a, b);
        }
    }
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let json = serde_json::json!({
        "cognitive_load": { "slow_step_secs": 20.0 }
    });
    let guards: FrictionGuards = serde_json::from_value(json).unwrap();
    assert_eq!(guards.cognitive_load.slow_step_secs, 20.0);
    assert_eq!(guards.cognitive_load.duration_window, 3);
    assert_eq!(guards.access, AccessEnvelope::default());
    assert!(guards.validate().is_ok());
}

#[test]
fn unordered_buckets_are_rejected() {
    let mut guards = FrictionGuards::default();
    guards.transfer_meaning.gap_buckets.moderate = 0.1;
    let err = guards.validate().unwrap_err();
    assert_eq!(err.category, FrictionCategory::TransferMeaning);
}

#[test]
fn degenerate_thresholds_are_rejected() {
    let cases: [(FrictionCategory, fn(&mut FrictionGuards)); 11] = [
        (FrictionCategory::Access, |g| g.access.failure_trigger = 0),
        (FrictionCategory::Access, |g| g.access.latency_trigger_secs = f64::NAN),
        (FrictionCategory::Access, |g| g.access.latency_trigger_secs = -0.5),
        (FrictionCategory::Access, |g| g.access.modality_failure_rate = 1.5),
        (FrictionCategory::CognitiveLoad, |g| g.cognitive_load.rising_trend_ratio = 0.5),
        (FrictionCategory::CognitiveLoad, |g| g.cognitive_load.hint_dependency_count = f64::INFINITY),
        (FrictionCategory::RegulationMotivation, |g| g.regulation_motivation.idle_gap_secs = f64::NAN),
        (FrictionCategory::TransferMeaning, |g| g.transfer_meaning.min_per_context = usize::MAX),
        (FrictionCategory::TransferMeaning, |g| g.transfer_meaning.familiar_accuracy_min = 1.2),
        (FrictionCategory::TransferMeaning, |g| g.transfer_meaning.novel_accuracy_max = -0.1),
        (FrictionCategory::TransferMeaning, |g| g.transfer_meaning.slowdown_ratio = f64::NAN),
    ];

    for (category, breaks) in cases {
        let mut guards = FrictionGuards::default();
        breaks(&mut guards);
        let err = guards.validate().unwrap_err();
        assert_eq!(err.category, category, "{}", err.reason);
    }
}

#[test]
fn oversized_context_minimum_fails_validation_from_json() {
    let json = serde_json::json!({
        "transfer_meaning": { "min_per_context": usize::MAX }
    });
    let guards: FrictionGuards = serde_json::from_value(json).unwrap();
    let err = guards.validate().unwrap_err();
    assert_eq!(err.category, FrictionCategory::TransferMeaning);
}
