use crate::evidence::{finite, mean, numeric_values, rate};
use crate::{check_threshold, DiagnoserFailure, EnvelopeError};
use friction_core::{
    labels, ExtentBuckets, FrictionCategory, FrictionProfile, Metric, Modality, SignalWindow,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const CATEGORY: FrictionCategory = FrictionCategory::Access;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccessEnvelope {
    /// Render attempts inspected (last N).
    pub render_window: usize,
    pub min_render_attempts: usize,
    pub failure_trigger: usize,
    pub latency_window: usize,
    pub min_latency_samples: usize,
    pub latency_trigger_secs: f64,
    /// Per-modality failure rate at which a modality counts as affected.
    pub modality_failure_rate: f64,
    pub failure_rate_buckets: ExtentBuckets,
    pub latency_buckets: ExtentBuckets,
}

impl Default for AccessEnvelope {
    fn default() -> Self {
        Self {
            render_window: 5,
            min_render_attempts: 2,
            failure_trigger: 2,
            latency_window: 3,
            min_latency_samples: 3,
            latency_trigger_secs: 0.5,
            modality_failure_rate: 0.5,
            failure_rate_buckets: ExtentBuckets::new(0.25, 0.5, 0.75),
            latency_buckets: ExtentBuckets::new(0.5, 1.0, 2.0),
        }
    }
}

impl AccessEnvelope {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.render_window == 0 || self.latency_window == 0 {
            return Err(EnvelopeError::new(CATEGORY, "evaluation windows must be non-empty"));
        }
        if self.min_render_attempts > self.render_window
            || self.min_latency_samples > self.latency_window
        {
            return Err(EnvelopeError::new(CATEGORY, "minimum samples exceed the evaluation window"));
        }
        if self.failure_trigger == 0 {
            return Err(EnvelopeError::new(CATEGORY, "failure trigger must be at least 1"));
        }
        check_threshold(CATEGORY, "latency trigger", self.latency_trigger_secs, 0.0..=f64::MAX)?;
        check_threshold(CATEGORY, "modality failure rate", self.modality_failure_rate, 0.0..=1.0)?;
        if !self.failure_rate_buckets.is_ordered() || !self.latency_buckets.is_ordered() {
            return Err(EnvelopeError::new(CATEGORY, "extent buckets must be strictly increasing"));
        }
        Ok(())
    }
}

pub fn detect(window: &SignalWindow, env: &AccessEnvelope) -> bool {
    let renders = window.latest(Metric::RenderAttempt, env.render_window);
    if renders.len() >= env.min_render_attempts.max(1) {
        let failures = renders.iter().filter(|s| s.is_label(labels::FAILURE)).count();
        if failures >= env.failure_trigger {
            return true;
        }
    }

    let latencies = numeric_values(&window.latest(Metric::NetworkLatency, env.latency_window));
    if latencies.len() >= env.min_latency_samples.max(1) {
        if let Some(avg) = mean(&latencies) {
            return avg > env.latency_trigger_secs;
        }
    }

    false
}

pub fn diagnose(
    window: &SignalWindow,
    env: &AccessEnvelope,
) -> Result<FrictionProfile, DiagnoserFailure> {
    let renders = window.latest(Metric::RenderAttempt, env.render_window);

    // (attempts, failures) per modality; untagged attempts cannot discriminate
    let mut per_modality: BTreeMap<Modality, (usize, usize)> = BTreeMap::new();
    for signal in &renders {
        if let Some(modality) = signal.modality() {
            let entry = per_modality.entry(modality).or_default();
            entry.0 += 1;
            if signal.is_label(labels::FAILURE) {
                entry.1 += 1;
            }
        }
    }

    let rates: BTreeMap<Modality, f64> = per_modality
        .iter()
        .map(|(m, (attempts, failures))| (*m, rate(*failures, *attempts)))
        .collect();
    let affected: BTreeSet<Modality> = rates
        .iter()
        .filter(|(_, r)| **r >= env.modality_failure_rate)
        .map(|(m, _)| *m)
        .collect();

    if !affected.is_empty() {
        let worst = rates.values().copied().fold(0.0_f64, f64::max);
        let worst = finite(CATEGORY, "worst modality failure rate", worst)?;
        return Ok(FrictionProfile {
            category: CATEGORY,
            extent: env.failure_rate_buckets.classify(worst),
            affected_modalities: affected,
            cause_hint: "modality-render-failures".into(),
            score: worst.clamp(0.0, 1.0),
        });
    }

    let latencies = numeric_values(&window.latest(Metric::NetworkLatency, env.latency_window));
    if latencies.len() >= env.min_latency_samples.max(1) {
        if let Some(avg) = mean(&latencies) {
            let avg = finite(CATEGORY, "mean latency", avg)?;
            let extent = env.latency_buckets.classify(avg);
            if extent.is_actionable() {
                return Ok(FrictionProfile {
                    category: CATEGORY,
                    extent,
                    affected_modalities: [Modality::Video, Modality::InteractiveTask]
                        .into_iter()
                        .collect(),
                    cause_hint: "high-latency".into(),
                    score: (avg / env.latency_buckets.severe).clamp(0.0, 1.0),
                });
            }
        }
    }

    Ok(FrictionProfile::abstain(CATEGORY, "no-discriminating-modality"))
}
