use crate::evidence::{finite, mean, modalities_of, rate};
use crate::{check_threshold, DiagnoserFailure, EnvelopeError};
use friction_core::{
    labels, meta_keys, Extent, ExtentBuckets, FrictionCategory, FrictionProfile, Metric, Signal,
    SignalWindow,
};
use serde::{Deserialize, Serialize};

const CATEGORY: FrictionCategory = FrictionCategory::TransferMeaning;

pub const CAUSE_NOVEL_DROP: &str = "novel-context-drop";
pub const CAUSE_NOVEL_SLOWDOWN: &str = "novel-context-slowdown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferEnvelope {
    pub outcome_window: usize,
    /// Samples required in each of the familiar and novel contexts.
    pub min_per_context: usize,
    pub familiar_accuracy_min: f64,
    pub novel_accuracy_max: f64,
    /// Mean novel response time above this multiple of the familiar mean
    /// activates on its own. Uses `response_secs` where outcomes carry it.
    pub slowdown_ratio: f64,
    pub gap_buckets: ExtentBuckets,
}

impl Default for TransferEnvelope {
    fn default() -> Self {
        Self {
            outcome_window: 8,
            min_per_context: 2,
            familiar_accuracy_min: 0.7,
            novel_accuracy_max: 0.4,
            slowdown_ratio: 2.0,
            gap_buckets: ExtentBuckets::new(0.3, 0.5, 0.7),
        }
    }
}

impl TransferEnvelope {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        let both = self.min_per_context.checked_mul(2);
        if self.min_per_context == 0 || both.map_or(true, |n| n > self.outcome_window) {
            return Err(EnvelopeError::new(
                CATEGORY,
                "outcome window must hold the minimum samples for both contexts",
            ));
        }
        check_threshold(CATEGORY, "familiar accuracy minimum", self.familiar_accuracy_min, 0.0..=1.0)?;
        check_threshold(CATEGORY, "novel accuracy maximum", self.novel_accuracy_max, 0.0..=1.0)?;
        check_threshold(CATEGORY, "slowdown ratio", self.slowdown_ratio, 1.0..=f64::MAX)?;
        if !self.gap_buckets.is_ordered() {
            return Err(EnvelopeError::new(CATEGORY, "extent buckets must be strictly increasing"));
        }
        Ok(())
    }
}

struct Split<'a> {
    familiar: Vec<&'a Signal>,
    novel: Vec<&'a Signal>,
}

impl<'a> Split<'a> {
    fn of(window: &'a SignalWindow, env: &TransferEnvelope) -> Self {
        let outcomes = window.latest(Metric::TransferOutcome, env.outcome_window);
        let (familiar, novel): (Vec<&Signal>, Vec<&Signal>) = outcomes
            .into_iter()
            .partition(|s| s.meta(meta_keys::CONTEXT) == Some(labels::FAMILIAR));
        Split { familiar, novel }
    }

    fn sufficient(&self, env: &TransferEnvelope) -> bool {
        self.familiar.len() >= env.min_per_context && self.novel.len() >= env.min_per_context
    }

    fn accuracy(signals: &[&Signal]) -> f64 {
        let correct = signals.iter().filter(|s| s.outcome_correct() == Some(true)).count();
        rate(correct, signals.len())
    }

    fn mean_response(signals: &[&Signal]) -> Option<f64> {
        let secs: Vec<f64> = signals.iter().filter_map(|s| s.response_secs()).collect();
        mean(&secs)
    }

    fn dropped(&self, env: &TransferEnvelope) -> bool {
        Split::accuracy(&self.familiar) > env.familiar_accuracy_min
            && Split::accuracy(&self.novel) < env.novel_accuracy_max
    }

    fn slowed(&self, env: &TransferEnvelope) -> bool {
        match (
            Split::mean_response(&self.familiar),
            Split::mean_response(&self.novel),
        ) {
            (Some(familiar), Some(novel)) => novel > familiar * env.slowdown_ratio,
            _ => false,
        }
    }
}

pub fn detect(window: &SignalWindow, env: &TransferEnvelope) -> bool {
    let split = Split::of(window, env);
    split.sufficient(env) && (split.dropped(env) || split.slowed(env))
}

pub fn diagnose(
    window: &SignalWindow,
    env: &TransferEnvelope,
) -> Result<FrictionProfile, DiagnoserFailure> {
    let split = Split::of(window, env);
    if !split.sufficient(env) {
        return Ok(FrictionProfile::abstain(CATEGORY, "too-few-context-samples"));
    }

    let gap = Split::accuracy(&split.familiar) - Split::accuracy(&split.novel);
    let gap = finite(CATEGORY, "accuracy gap", gap)?;
    let mut extent = env.gap_buckets.classify(gap);

    if !split.dropped(env) && split.slowed(env) {
        return Ok(FrictionProfile {
            category: CATEGORY,
            extent: extent.max(Extent::Mild),
            affected_modalities: modalities_of(split.novel.iter().copied()),
            cause_hint: CAUSE_NOVEL_SLOWDOWN.into(),
            score: gap.clamp(0.0, 1.0),
        });
    }
    if split.slowed(env) {
        extent = extent.escalate();
    }

    let missed = split
        .novel
        .iter()
        .copied()
        .filter(|s| s.outcome_correct() == Some(false));

    Ok(FrictionProfile {
        category: CATEGORY,
        extent,
        affected_modalities: modalities_of(missed),
        cause_hint: CAUSE_NOVEL_DROP.into(),
        score: gap.clamp(0.0, 1.0),
    })
}
