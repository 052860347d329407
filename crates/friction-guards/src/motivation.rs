use crate::evidence::{finite, modalities_of, rate};
use crate::{check_threshold, DiagnoserFailure, EnvelopeError};
use friction_core::{
    ExtentBuckets, FrictionCategory, FrictionProfile, Metric, ResponsePattern, Signal,
    SignalCategory, SignalWindow,
};
use serde::{Deserialize, Serialize};

const CATEGORY: FrictionCategory = FrictionCategory::RegulationMotivation;

pub const CAUSE_DISENGAGEMENT: &str = "disengagement-events";
pub const CAUSE_IDLE: &str = "long-idle-gaps";
pub const CAUSE_RUSHED: &str = "rushed-attempts";
pub const CAUSE_ERRORS_AFTER_HINTS: &str = "errors-after-hints";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MotivationEnvelope {
    /// Motivation samples (idle gaps, disengagement events) inspected.
    pub event_window: usize,
    pub answer_window: usize,
    pub min_samples: usize,
    pub idle_gap_secs: f64,
    /// Count an incorrect answer given right after a hint as an indicator.
    pub errors_after_hints: bool,
    pub indicator_trigger: usize,
    pub indicator_buckets: ExtentBuckets,
}

impl Default for MotivationEnvelope {
    fn default() -> Self {
        Self {
            event_window: 5,
            answer_window: 5,
            min_samples: 2,
            idle_gap_secs: 90.0,
            errors_after_hints: true,
            indicator_trigger: 2,
            indicator_buckets: ExtentBuckets::new(0.2, 0.4, 0.7),
        }
    }
}

impl MotivationEnvelope {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.event_window == 0 && self.answer_window == 0 {
            return Err(EnvelopeError::new(CATEGORY, "at least one evaluation window must be non-empty"));
        }
        if self.indicator_trigger == 0 {
            return Err(EnvelopeError::new(CATEGORY, "indicator trigger must be at least 1"));
        }
        check_threshold(CATEGORY, "idle gap", self.idle_gap_secs, 0.0..=f64::MAX)?;
        if !self.indicator_buckets.is_ordered() {
            return Err(EnvelopeError::new(CATEGORY, "extent buckets must be strictly increasing"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Indicators {
    samples: usize,
    idle: usize,
    disengaged: usize,
    rushed: usize,
    after_hint: usize,
}

impl Indicators {
    fn total(&self) -> usize {
        self.idle + self.disengaged + self.rushed + self.after_hint
    }

    /// Dominant indicator; ties go to the earlier entry.
    fn cause(&self) -> &'static str {
        [
            (self.disengaged, CAUSE_DISENGAGEMENT),
            (self.idle, CAUSE_IDLE),
            (self.rushed, CAUSE_RUSHED),
            (self.after_hint, CAUSE_ERRORS_AFTER_HINTS),
        ]
        .into_iter()
        .fold((0, CAUSE_DISENGAGEMENT), |best, next| {
            if next.0 > best.0 {
                next
            } else {
                best
            }
        })
        .1
    }
}

fn recent_events(window: &SignalWindow, n: usize) -> Vec<&Signal> {
    let mut events: Vec<&Signal> = window.view(SignalCategory::Motivation, None).rev().take(n).collect();
    events.reverse();
    events
}

/// Incorrect answers among the last `n` with a hint since the answer before them.
fn errors_after_hints(window: &SignalWindow, n: usize) -> usize {
    // one extra answer bounds the first inspected answer
    let answers = window.latest(Metric::AnswerOutcome, n.saturating_add(1));
    let hints: Vec<&Signal> = window
        .view_metric(Metric::HintUsed, None)
        .filter(|h| h.value.as_numeric().map_or(false, |v| v > 0.0))
        .collect();
    let skip = answers.len().saturating_sub(n);

    answers
        .iter()
        .enumerate()
        .skip(skip)
        .filter(|(_, answer)| answer.outcome_correct() == Some(false))
        .filter(|(i, answer)| {
            let since = i.checked_sub(1).map(|prev| answers[prev].timestamp);
            hints.iter().any(|h| {
                h.timestamp <= answer.timestamp && since.map_or(true, |s| h.timestamp > s)
            })
        })
        .count()
}

fn indicators(window: &SignalWindow, env: &MotivationEnvelope) -> Indicators {
    let events = recent_events(window, env.event_window);
    let answers = window.latest(Metric::AnswerOutcome, env.answer_window);

    let idle = events
        .iter()
        .filter(|s| s.metric == Metric::IdleGap)
        .filter(|s| s.value.as_numeric().map_or(false, |v| v > env.idle_gap_secs))
        .count();
    let disengaged = events
        .iter()
        .filter(|s| s.metric == Metric::Disengagement)
        .count();
    let rushed = answers
        .iter()
        .filter(|s| s.response_pattern() == Some(ResponsePattern::RushedError))
        .count();
    let after_hint = if env.errors_after_hints {
        errors_after_hints(window, env.answer_window)
    } else {
        0
    };

    Indicators {
        samples: events.len() + answers.len(),
        idle,
        disengaged,
        rushed,
        after_hint,
    }
}

pub fn detect(window: &SignalWindow, env: &MotivationEnvelope) -> bool {
    let found = indicators(window, env);
    found.samples >= env.min_samples.max(1) && found.total() >= env.indicator_trigger
}

pub fn diagnose(
    window: &SignalWindow,
    env: &MotivationEnvelope,
) -> Result<FrictionProfile, DiagnoserFailure> {
    let found = indicators(window, env);
    if found.samples < env.min_samples || found.total() == 0 {
        return Ok(FrictionProfile::abstain(CATEGORY, "no-disengagement-evidence"));
    }

    let score = finite(CATEGORY, "indicator rate", rate(found.total(), found.samples))?;
    let answers = window.latest(Metric::AnswerOutcome, env.answer_window);

    Ok(FrictionProfile {
        category: CATEGORY,
        extent: env.indicator_buckets.classify(score),
        affected_modalities: modalities_of(answers.iter().copied()),
        cause_hint: found.cause().into(),
        score: score.clamp(0.0, 1.0),
    })
}
