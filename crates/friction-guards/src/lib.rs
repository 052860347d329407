pub mod access;
pub mod cognitive_load;
pub mod evidence;
pub mod interaction;
pub mod motivation;
pub mod transfer;

#[cfg(test)]
mod tests;

pub use access::AccessEnvelope;
pub use cognitive_load::CognitiveLoadEnvelope;
pub use interaction::InteractionEnvelope;
pub use motivation::MotivationEnvelope;
pub use transfer::TransferEnvelope;

use friction_core::{ActivationMap, FrictionCategory, FrictionProfile, SignalWindow};
use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Internal fault of one category's diagnoser. Never crosses into another category.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{category} diagnoser failed: {reason}")]
pub struct DiagnoserFailure {
    pub category: FrictionCategory,
    pub reason: String,
}

impl DiagnoserFailure {
    pub fn new(category: FrictionCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{category} envelope is invalid: {reason}")]
pub struct EnvelopeError {
    pub category: FrictionCategory,
    pub reason: String,
}

impl EnvelopeError {
    pub fn new(category: FrictionCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

/// Rejects a threshold that is NaN, infinite, or outside `range`.
pub(crate) fn check_threshold(
    category: FrictionCategory,
    name: &str,
    value: f64,
    range: RangeInclusive<f64>,
) -> Result<(), EnvelopeError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(EnvelopeError::new(
            category,
            format!(
                "{name} must lie in [{}, {}], got {value}",
                range.start(),
                range.end()
            ),
        ))
    }
}

/// Thresholds and extent buckets for all five categories.
///
/// Dispatch is a closed match over [`FrictionCategory`]; each arm calls the
/// category's own module and nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrictionGuards {
    pub access: AccessEnvelope,
    pub cognitive_load: CognitiveLoadEnvelope,
    pub regulation_motivation: MotivationEnvelope,
    pub interaction_feedback: InteractionEnvelope,
    pub transfer_meaning: TransferEnvelope,
}

impl FrictionGuards {
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        self.access.validate()?;
        self.cognitive_load.validate()?;
        self.regulation_motivation.validate()?;
        self.interaction_feedback.validate()?;
        self.transfer_meaning.validate()
    }

    /// Layer-1 evaluation of one category.
    pub fn detect(&self, category: FrictionCategory, window: &SignalWindow) -> bool {
        match category {
            FrictionCategory::Access => access::detect(window, &self.access),
            FrictionCategory::CognitiveLoad => cognitive_load::detect(window, &self.cognitive_load),
            FrictionCategory::RegulationMotivation => {
                motivation::detect(window, &self.regulation_motivation)
            }
            FrictionCategory::InteractionFeedback => {
                interaction::detect(window, &self.interaction_feedback)
            }
            FrictionCategory::TransferMeaning => transfer::detect(window, &self.transfer_meaning),
        }
    }

    pub fn detect_all(&self, window: &SignalWindow) -> ActivationMap {
        let map: ActivationMap = FrictionCategory::ALL
            .into_iter()
            .map(|c| (c, self.detect(c, window)))
            .collect();
        debug!("layer-1 activation: {:?}", map.active().collect::<Vec<_>>());
        map
    }

    /// Layer-2 evaluation of one category. Callers only invoke this for active bits.
    pub fn diagnose(
        &self,
        category: FrictionCategory,
        window: &SignalWindow,
    ) -> Result<FrictionProfile, DiagnoserFailure> {
        let profile = match category {
            FrictionCategory::Access => access::diagnose(window, &self.access),
            FrictionCategory::CognitiveLoad => {
                cognitive_load::diagnose(window, &self.cognitive_load)
            }
            FrictionCategory::RegulationMotivation => {
                motivation::diagnose(window, &self.regulation_motivation)
            }
            FrictionCategory::InteractionFeedback => {
                interaction::diagnose(window, &self.interaction_feedback)
            }
            FrictionCategory::TransferMeaning => {
                transfer::diagnose(window, &self.transfer_meaning)
            }
        }?;
        debug!(
            "layer-2 {}: extent={:?} cause={}",
            category, profile.extent, profile.cause_hint
        );
        Ok(profile)
    }
}
