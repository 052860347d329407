use crate::evidence::{finite, mean, modalities_of, numeric_values};
use crate::{check_threshold, DiagnoserFailure, EnvelopeError};
use friction_core::{
    Extent, ExtentBuckets, FrictionCategory, FrictionProfile, Metric, Modality, SignalWindow,
};
use serde::{Deserialize, Serialize};

const CATEGORY: FrictionCategory = FrictionCategory::CognitiveLoad;

pub const CAUSE_SLOW_STEPS: &str = "sustained-slow-steps";
pub const CAUSE_HINT_DEPENDENCY: &str = "hint-dependency";
pub const CAUSE_RISING_TIMES: &str = "rising-response-time";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CognitiveLoadEnvelope {
    /// Step durations inspected (last M).
    pub duration_window: usize,
    pub min_duration_samples: usize,
    /// Every inspected step must take longer than this to activate.
    pub slow_step_secs: f64,
    pub duration_buckets: ExtentBuckets,
    pub hint_window: usize,
    /// Hints used within `hint_window` that raise the extent one level.
    pub hint_dependency_count: f64,
    /// The newest inspected step taking more than this multiple of the oldest
    /// counts as a rising trend. The newest step must also be slow.
    pub rising_trend_ratio: f64,
}

impl Default for CognitiveLoadEnvelope {
    fn default() -> Self {
        Self {
            duration_window: 3,
            min_duration_samples: 3,
            slow_step_secs: 10.0,
            duration_buckets: ExtentBuckets::new(10.0, 30.0, 60.0),
            hint_window: 5,
            hint_dependency_count: 2.0,
            rising_trend_ratio: 1.5,
        }
    }
}

impl CognitiveLoadEnvelope {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.duration_window == 0 || self.min_duration_samples == 0 {
            return Err(EnvelopeError::new(CATEGORY, "duration window must be non-empty"));
        }
        if self.min_duration_samples > self.duration_window {
            return Err(EnvelopeError::new(CATEGORY, "minimum samples exceed the duration window"));
        }
        if !(self.slow_step_secs.is_finite() && self.slow_step_secs >= 0.0) {
            return Err(EnvelopeError::new(CATEGORY, "slow step threshold must be a non-negative number"));
        }
        check_threshold(CATEGORY, "hint dependency count", self.hint_dependency_count, 0.0..=f64::MAX)?;
        check_threshold(CATEGORY, "rising trend ratio", self.rising_trend_ratio, 1.0..=f64::MAX)?;
        if !self.duration_buckets.is_ordered() {
            return Err(EnvelopeError::new(CATEGORY, "extent buckets must be strictly increasing"));
        }
        Ok(())
    }
}

fn all_slow(durations: &[f64], env: &CognitiveLoadEnvelope) -> bool {
    durations.iter().all(|d| *d > env.slow_step_secs)
}

/// Newest step slower than `rising_trend_ratio` times the oldest, and slow itself.
fn rising(durations: &[f64], env: &CognitiveLoadEnvelope) -> bool {
    match (durations.first(), durations.last()) {
        (Some(first), Some(last)) if durations.len() >= 2 => {
            *last > env.slow_step_secs && *last > first * env.rising_trend_ratio
        }
        _ => false,
    }
}

pub fn detect(window: &SignalWindow, env: &CognitiveLoadEnvelope) -> bool {
    let durations = numeric_values(&window.latest(Metric::StepDuration, env.duration_window));
    durations.len() >= env.min_duration_samples.max(1)
        && (all_slow(&durations, env) || rising(&durations, env))
}

pub fn diagnose(
    window: &SignalWindow,
    env: &CognitiveLoadEnvelope,
) -> Result<FrictionProfile, DiagnoserFailure> {
    let recent = window.latest(Metric::StepDuration, env.duration_window);
    let durations = numeric_values(&recent);
    if durations.len() < env.min_duration_samples {
        return Ok(FrictionProfile::abstain(CATEGORY, "too-few-step-durations"));
    }

    let avg = match mean(&durations) {
        Some(avg) => finite(CATEGORY, "mean step duration", avg)?,
        None => return Ok(FrictionProfile::abstain(CATEGORY, "too-few-step-durations")),
    };
    let mut extent = env.duration_buckets.classify(avg);

    // a rising trend is friction even while the mean is still short
    let trend_only = !all_slow(&durations, env) && rising(&durations, env);
    if trend_only {
        extent = extent.max(Extent::Mild);
    }

    let hints: f64 = numeric_values(&window.latest(Metric::HintUsed, env.hint_window))
        .iter()
        .sum();
    let hints = finite(CATEGORY, "hint total", hints)?;

    let cause = if extent.is_actionable() && hints >= env.hint_dependency_count {
        extent = extent.escalate();
        CAUSE_HINT_DEPENDENCY
    } else if trend_only {
        CAUSE_RISING_TIMES
    } else {
        CAUSE_SLOW_STEPS
    };

    let mut modalities = modalities_of(recent.iter().copied());
    if modalities.is_empty() {
        modalities.insert(Modality::Text);
    }

    Ok(FrictionProfile {
        category: CATEGORY,
        extent,
        affected_modalities: modalities,
        cause_hint: cause.into(),
        score: (avg / env.duration_buckets.severe).clamp(0.0, 1.0),
    })
}
