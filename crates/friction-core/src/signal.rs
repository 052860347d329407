use crate::category::{Modality, SignalCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Categorical labels accepted by the outcome and event metrics.
pub mod labels {
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
    pub const CORRECT: &str = "correct";
    pub const INCORRECT: &str = "incorrect";
    pub const SKIP: &str = "skip";
    pub const ABANDON: &str = "abandon";
    pub const EXIT_ATTEMPT: &str = "exit-attempt";
    pub const FAMILIAR: &str = "familiar";
    pub const NOVEL: &str = "novel";
}

/// Metadata keys the engine understands. Anything else is carried through untouched.
pub mod meta_keys {
    pub const MODALITY: &str = "modality";
    pub const STEP: &str = "step";
    pub const RESPONSE_SECS: &str = "response_secs";
    pub const CONTEXT: &str = "context";
}

const RENDER_LABELS: &[&str] = &[labels::SUCCESS, labels::FAILURE];
const OUTCOME_LABELS: &[&str] = &[labels::CORRECT, labels::INCORRECT];
const DISENGAGEMENT_LABELS: &[&str] = &[labels::SKIP, labels::ABANDON, labels::EXIT_ATTEMPT];
const STYLE_LABELS: &[&str] = &["none", "analogies", "step-by-step", "examples"];
const MODALITY_LABELS: &[&str] = &["text", "video", "interactive-task"];

/// A concrete measurement. Each metric belongs to exactly one observation category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    RenderAttempt,
    NetworkLatency,
    AnswerOutcome,
    StepDuration,
    HintUsed,
    IdleGap,
    Disengagement,
    TransferOutcome,
    ExplanationStyle,
    PreferredModality,
    ConfusionReport,
}

impl Metric {
    pub fn category(self) -> SignalCategory {
        match self {
            Metric::RenderAttempt | Metric::NetworkLatency => SignalCategory::Access,
            Metric::AnswerOutcome => SignalCategory::Interaction,
            Metric::StepDuration | Metric::HintUsed => SignalCategory::CognitiveLoad,
            Metric::IdleGap | Metric::Disengagement => SignalCategory::Motivation,
            Metric::TransferOutcome => SignalCategory::Transfer,
            Metric::ExplanationStyle | Metric::PreferredModality | Metric::ConfusionReport => {
                SignalCategory::Preference
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::RenderAttempt => "render-attempt",
            Metric::NetworkLatency => "network-latency",
            Metric::AnswerOutcome => "answer-outcome",
            Metric::StepDuration => "step-duration",
            Metric::HintUsed => "hint-used",
            Metric::IdleGap => "idle-gap",
            Metric::Disengagement => "disengagement",
            Metric::TransferOutcome => "transfer-outcome",
            Metric::ExplanationStyle => "explanation-style",
            Metric::PreferredModality => "preferred-modality",
            Metric::ConfusionReport => "confusion-report",
        }
    }

    /// Accepted labels for categorical metrics, `None` for numeric ones.
    pub fn labels(self) -> Option<&'static [&'static str]> {
        match self {
            Metric::RenderAttempt => Some(RENDER_LABELS),
            Metric::AnswerOutcome | Metric::TransferOutcome => Some(OUTCOME_LABELS),
            Metric::Disengagement => Some(DISENGAGEMENT_LABELS),
            Metric::ExplanationStyle => Some(STYLE_LABELS),
            Metric::PreferredModality => Some(MODALITY_LABELS),
            Metric::NetworkLatency
            | Metric::StepDuration
            | Metric::HintUsed
            | Metric::IdleGap
            | Metric::ConfusionReport => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SignalValue {
    Numeric(f64),
    Categorical(String),
}

impl SignalValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            SignalValue::Numeric(v) => Some(*v),
            SignalValue::Categorical(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            SignalValue::Categorical(label) => Some(label.as_str()),
            SignalValue::Numeric(_) => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SignalError {
    #[error("metric `{metric}` belongs to {expected:?}, signal was tagged {actual:?}")]
    CategoryMismatch {
        metric: Metric,
        expected: SignalCategory,
        actual: SignalCategory,
    },
    #[error("metric `{0}` expects a numeric value")]
    ExpectedNumeric(Metric),
    #[error("metric `{0}` expects a categorical value")]
    ExpectedCategorical(Metric),
    #[error("metric `{metric}` value {value} is not finite")]
    NonFinite { metric: Metric, value: f64 },
    #[error("metric `{metric}` value {value} is negative")]
    Negative { metric: Metric, value: f64 },
    #[error("metric `{metric}` does not accept label `{label}`")]
    UnknownLabel { metric: Metric, label: String },
    #[error("metadata `{key}` on `{metric}` is invalid: `{value}`")]
    InvalidMetadata {
        metric: Metric,
        key: String,
        value: String,
    },
    #[error("metadata `{key}` is required on `{metric}`")]
    MissingMetadata { metric: Metric, key: &'static str },
    #[error("signal at {timestamp} is older than the retention cutoff {cutoff}")]
    Stale {
        timestamp: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    },
}

/// One observed sample. Immutable once it is in a window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub category: SignalCategory,
    pub metric: Metric,
    pub timestamp: DateTime<Utc>,
    pub value: SignalValue,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Signal {
    pub fn numeric(metric: Metric, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            category: metric.category(),
            metric,
            timestamp,
            value: SignalValue::Numeric(value),
            metadata: BTreeMap::new(),
        }
    }

    pub fn categorical(metric: Metric, timestamp: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            category: metric.category(),
            metric,
            timestamp,
            value: SignalValue::Categorical(label.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn is_label(&self, label: &str) -> bool {
        self.value.as_label() == Some(label)
    }

    pub fn modality(&self) -> Option<Modality> {
        self.meta(meta_keys::MODALITY).and_then(|m| m.parse().ok())
    }

    pub fn step(&self) -> Option<&str> {
        self.meta(meta_keys::STEP)
    }

    pub fn response_secs(&self) -> Option<f64> {
        self.meta(meta_keys::RESPONSE_SECS)
            .and_then(|v| v.parse::<f64>().ok())
    }

    /// `Some(true)` for a correct outcome, `Some(false)` for an incorrect one.
    pub fn outcome_correct(&self) -> Option<bool> {
        match self.metric {
            Metric::AnswerOutcome | Metric::TransferOutcome => {
                match self.value.as_label() {
                    Some(labels::CORRECT) => Some(true),
                    Some(labels::INCORRECT) => Some(false),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn response_pattern(&self) -> Option<ResponsePattern> {
        let correct = self.outcome_correct()?;
        let secs = self.response_secs()?;
        Some(ResponsePattern::classify(correct, secs))
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        let expected = self.metric.category();
        if self.category != expected {
            return Err(SignalError::CategoryMismatch {
                metric: self.metric,
                expected,
                actual: self.category,
            });
        }

        match (self.metric.labels(), &self.value) {
            (None, SignalValue::Numeric(v)) => {
                if !v.is_finite() {
                    return Err(SignalError::NonFinite {
                        metric: self.metric,
                        value: *v,
                    });
                }
                if *v < 0.0 {
                    return Err(SignalError::Negative {
                        metric: self.metric,
                        value: *v,
                    });
                }
            }
            (None, SignalValue::Categorical(_)) => {
                return Err(SignalError::ExpectedNumeric(self.metric));
            }
            (Some(_), SignalValue::Numeric(_)) => {
                return Err(SignalError::ExpectedCategorical(self.metric));
            }
            (Some(allowed), SignalValue::Categorical(label)) => {
                if !allowed.contains(&label.as_str()) {
                    return Err(SignalError::UnknownLabel {
                        metric: self.metric,
                        label: label.clone(),
                    });
                }
            }
        }

        self.validate_metadata()
    }

    fn validate_metadata(&self) -> Result<(), SignalError> {
        if let Some(raw) = self.meta(meta_keys::MODALITY) {
            if raw.parse::<Modality>().is_err() {
                return Err(self.invalid_meta(meta_keys::MODALITY, raw));
            }
        }

        if let Some(raw) = self.meta(meta_keys::RESPONSE_SECS) {
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => {}
                _ => return Err(self.invalid_meta(meta_keys::RESPONSE_SECS, raw)),
            }
        }

        if self.metric == Metric::TransferOutcome {
            match self.meta(meta_keys::CONTEXT) {
                None => {
                    return Err(SignalError::MissingMetadata {
                        metric: self.metric,
                        key: meta_keys::CONTEXT,
                    })
                }
                Some(labels::FAMILIAR) | Some(labels::NOVEL) => {}
                Some(other) => return Err(self.invalid_meta(meta_keys::CONTEXT, other)),
            }
        }

        Ok(())
    }

    fn invalid_meta(&self, key: &str, value: &str) -> SignalError {
        SignalError::InvalidMetadata {
            metric: self.metric,
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Coarse shape of one answer, judged from correctness and response time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResponsePattern {
    RushedError,
    Struggling,
    ConfidentFast,
    DeliberateCorrect,
    Typical,
}

impl ResponsePattern {
    pub fn classify(correct: bool, response_secs: f64) -> Self {
        match (correct, response_secs) {
            (false, s) if s < 5.0 => ResponsePattern::RushedError,
            (false, s) if s > 60.0 => ResponsePattern::Struggling,
            (true, s) if s < 10.0 => ResponsePattern::ConfidentFast,
            (true, s) if s > 30.0 => ResponsePattern::DeliberateCorrect,
            _ => ResponsePattern::Typical,
        }
    }
}
