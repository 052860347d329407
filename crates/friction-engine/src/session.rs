use crate::adaptation::AdaptationState;
use crate::directive::HistoryAction;
use chrono::{DateTime, Utc};
use friction_core::{
    ActivationMap, FrictionCategory, FrictionProfile, Metric, Modality, SignalWindow, WindowConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        SessionId(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExplanationStyle {
    #[default]
    None,
    Analogies,
    StepByStep,
    Examples,
}

impl ExplanationStyle {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "none" => Some(ExplanationStyle::None),
            "analogies" => Some(ExplanationStyle::Analogies),
            "step-by-step" => Some(ExplanationStyle::StepByStep),
            "examples" => Some(ExplanationStyle::Examples),
            _ => None,
        }
    }
}

/// What the learner said they want. Passed through to content selection,
/// never fed into detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExplicitPreferences {
    pub explanation_style: ExplanationStyle,
    pub preferred_modality: Option<Modality>,
    pub confusion_reports: f64,
}

impl ExplicitPreferences {
    /// Latest stated preference wins; confusion reports are summed over the window.
    pub fn from_window(window: &SignalWindow) -> Self {
        let explanation_style = window
            .latest(Metric::ExplanationStyle, 1)
            .first()
            .and_then(|s| s.value.as_label())
            .and_then(ExplanationStyle::from_label)
            .unwrap_or_default();
        let preferred_modality = window
            .latest(Metric::PreferredModality, 1)
            .first()
            .and_then(|s| s.value.as_label())
            .and_then(|label| label.parse().ok());
        let confusion_reports = window
            .view_metric(Metric::ConfusionReport, None)
            .filter_map(|s| s.value.as_numeric())
            .sum();
        Self {
            explanation_style,
            preferred_modality,
            confusion_reports,
        }
    }
}

/// Per-learner state. Only the cycle orchestrator commits into it.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
    pub(crate) window: SignalWindow,
    pub(crate) activation: ActivationMap,
    pub(crate) profiles: BTreeMap<FrictionCategory, FrictionProfile>,
    pub(crate) adaptation: AdaptationState,
    pub(crate) cycles: u64,
    pub(crate) last_cycle_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: SessionId, window: WindowConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            window: SignalWindow::new(window),
            activation: ActivationMap::new(),
            profiles: BTreeMap::new(),
            adaptation: AdaptationState::new(),
            cycles: 0,
            last_cycle_at: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn window(&self) -> &SignalWindow {
        &self.window
    }

    pub fn activation(&self) -> &ActivationMap {
        &self.activation
    }

    pub fn profiles(&self) -> &BTreeMap<FrictionCategory, FrictionProfile> {
        &self.profiles
    }

    pub fn adaptation(&self) -> &AdaptationState {
        &self.adaptation
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn preferences(&self) -> ExplicitPreferences {
        ExplicitPreferences::from_window(&self.window)
    }

    pub fn summary(&self, ended_at: DateTime<Utc>) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            started_at: self.started_at,
            ended_at,
            cycles: self.cycles,
            signals_retained: self.window.len(),
            applied: self.adaptation.count(HistoryAction::Applied),
            updated: self.adaptation.count(HistoryAction::Updated),
            reversed: self.adaptation.count(HistoryAction::Reversed),
            still_active: self
                .adaptation
                .active_directives()
                .map(|d| d.category)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub cycles: u64,
    pub signals_retained: usize,
    pub applied: usize,
    pub updated: usize,
    pub reversed: usize,
    pub still_active: Vec<FrictionCategory>,
}
