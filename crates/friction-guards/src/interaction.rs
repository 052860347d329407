use crate::evidence::{finite, modalities_of, rate};
use crate::{DiagnoserFailure, EnvelopeError};
use friction_core::{
    ExtentBuckets, FrictionCategory, FrictionProfile, Metric, ResponsePattern, Signal,
    SignalWindow,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CATEGORY: FrictionCategory = FrictionCategory::InteractionFeedback;

pub const CAUSE_REPEATED_STEP: &str = "repeated-step-errors";
pub const CAUSE_RUSHED: &str = "rushed-errors";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InteractionEnvelope {
    pub answer_window: usize,
    pub min_answers: usize,
    /// Incorrect answers on one step that count as a repeated-error pattern.
    pub repeated_step_errors: usize,
    pub rushed_error_trigger: usize,
    pub error_rate_buckets: ExtentBuckets,
}

impl Default for InteractionEnvelope {
    fn default() -> Self {
        Self {
            answer_window: 5,
            min_answers: 2,
            repeated_step_errors: 2,
            rushed_error_trigger: 2,
            error_rate_buckets: ExtentBuckets::new(0.2, 0.4, 0.6),
        }
    }
}

impl InteractionEnvelope {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.answer_window == 0 {
            return Err(EnvelopeError::new(CATEGORY, "answer window must be non-empty"));
        }
        if self.min_answers > self.answer_window {
            return Err(EnvelopeError::new(CATEGORY, "minimum answers exceed the answer window"));
        }
        if self.repeated_step_errors == 0 || self.rushed_error_trigger == 0 {
            return Err(EnvelopeError::new(CATEGORY, "error triggers must be at least 1"));
        }
        if !self.error_rate_buckets.is_ordered() {
            return Err(EnvelopeError::new(CATEGORY, "extent buckets must be strictly increasing"));
        }
        Ok(())
    }
}

fn worst_step_errors(answers: &[&Signal]) -> usize {
    let mut per_step: BTreeMap<&str, usize> = BTreeMap::new();
    for answer in answers {
        if answer.outcome_correct() == Some(false) {
            if let Some(step) = answer.step() {
                *per_step.entry(step).or_default() += 1;
            }
        }
    }
    per_step.values().copied().max().unwrap_or(0)
}

fn rushed_errors(answers: &[&Signal]) -> usize {
    answers
        .iter()
        .filter(|s| s.response_pattern() == Some(ResponsePattern::RushedError))
        .count()
}

pub fn detect(window: &SignalWindow, env: &InteractionEnvelope) -> bool {
    let answers = window.latest(Metric::AnswerOutcome, env.answer_window);
    if answers.len() < env.min_answers.max(1) {
        return false;
    }
    worst_step_errors(&answers) >= env.repeated_step_errors
        || rushed_errors(&answers) >= env.rushed_error_trigger
}

pub fn diagnose(
    window: &SignalWindow,
    env: &InteractionEnvelope,
) -> Result<FrictionProfile, DiagnoserFailure> {
    let answers = window.latest(Metric::AnswerOutcome, env.answer_window);
    if answers.len() < env.min_answers.max(1) {
        return Ok(FrictionProfile::abstain(CATEGORY, "too-few-answers"));
    }

    let incorrect: Vec<&Signal> = answers
        .iter()
        .copied()
        .filter(|s| s.outcome_correct() == Some(false))
        .collect();
    let error_rate = finite(CATEGORY, "error rate", rate(incorrect.len(), answers.len()))?;

    let cause = if worst_step_errors(&answers) >= env.repeated_step_errors {
        CAUSE_REPEATED_STEP
    } else if rushed_errors(&answers) >= env.rushed_error_trigger {
        CAUSE_RUSHED
    } else {
        return Ok(FrictionProfile::abstain(CATEGORY, "no-error-pattern"));
    };

    Ok(FrictionProfile {
        category: CATEGORY,
        extent: env.error_rate_buckets.classify(error_rate),
        affected_modalities: modalities_of(incorrect),
        cause_hint: cause.into(),
        score: error_rate.clamp(0.0, 1.0),
    })
}
