use chrono::{DateTime, Utc};
use friction_core::{Extent, FrictionCategory, FrictionProfile, Modality};
use friction_guards::cognitive_load::CAUSE_HINT_DEPENDENCY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentKind {
    DeliveryFormatChange,
    PacingChange,
    ScaffoldingAdd,
    GoalReframe,
    CorrectionClarify,
    ContextVariationAdd,
}

impl AdjustmentKind {
    pub fn category(self) -> FrictionCategory {
        match self {
            AdjustmentKind::DeliveryFormatChange => FrictionCategory::Access,
            AdjustmentKind::PacingChange | AdjustmentKind::ScaffoldingAdd => {
                FrictionCategory::CognitiveLoad
            }
            AdjustmentKind::GoalReframe => FrictionCategory::RegulationMotivation,
            AdjustmentKind::CorrectionClarify => FrictionCategory::InteractionFeedback,
            AdjustmentKind::ContextVariationAdd => FrictionCategory::TransferMeaning,
        }
    }

    /// Picks the kind for a fresh directive from the category's fixed set.
    pub fn select(profile: &FrictionProfile) -> Self {
        match profile.category {
            FrictionCategory::Access => AdjustmentKind::DeliveryFormatChange,
            FrictionCategory::CognitiveLoad => {
                if profile.cause_hint == CAUSE_HINT_DEPENDENCY || profile.extent == Extent::Severe
                {
                    AdjustmentKind::ScaffoldingAdd
                } else {
                    AdjustmentKind::PacingChange
                }
            }
            FrictionCategory::RegulationMotivation => AdjustmentKind::GoalReframe,
            FrictionCategory::InteractionFeedback => AdjustmentKind::CorrectionClarify,
            FrictionCategory::TransferMeaning => AdjustmentKind::ContextVariationAdd,
        }
    }

    /// Presentation hints handed to the rendering side along with the directive.
    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            AdjustmentKind::DeliveryFormatChange => &[
                "switch the affected modality to a lighter format",
                "offer a text alternative for heavy media",
                "enlarge interactive targets and simplify layout",
            ],
            AdjustmentKind::PacingChange => &[
                "insert interim checkpoints",
                "show progress and time-on-step cues",
                "allow self-paced advancement",
            ],
            AdjustmentKind::ScaffoldingAdd => &[
                "split the step into smaller sub-steps",
                "show a worked example before practice",
                "fade hints gradually instead of revealing answers",
            ],
            AdjustmentKind::GoalReframe => &[
                "restate the goal of the current step",
                "surface micro-milestones already reached",
                "shorten the remaining segment",
            ],
            AdjustmentKind::CorrectionClarify => &[
                "give immediate targeted feedback on the error",
                "restate the task instructions",
                "ask for a confirmation before submitting",
            ],
            AdjustmentKind::ContextVariationAdd => &[
                "add a bridging example in a new context",
                "connect the concept to a practical situation",
            ],
        }
    }
}

/// A reversible change to content presentation, owned by one category slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentDirective {
    pub id: Uuid,
    pub category: FrictionCategory,
    pub kind: AdjustmentKind,
    pub extent: Extent,
    pub affected_modalities: BTreeSet<Modality>,
    pub cause_hint: String,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl AdjustmentDirective {
    pub fn from_profile(profile: &FrictionProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: profile.category,
            kind: AdjustmentKind::select(profile),
            extent: profile.extent,
            affected_modalities: profile.affected_modalities.clone(),
            cause_hint: profile.cause_hint.clone(),
            applied_at: now,
            updated_at: now,
            reversed_at: None,
            active: true,
        }
    }

    /// Refreshes metadata from a newer profile. Returns whether anything changed.
    pub fn refresh(&mut self, profile: &FrictionProfile, now: DateTime<Utc>) -> bool {
        let changed = self.extent != profile.extent
            || self.affected_modalities != profile.affected_modalities
            || self.cause_hint != profile.cause_hint;
        if changed {
            self.extent = profile.extent;
            self.affected_modalities = profile.affected_modalities.clone();
            self.cause_hint = profile.cause_hint.clone();
            self.updated_at = now;
        }
        changed
    }

    pub fn reverse(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.reversed_at = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryAction {
    Applied,
    Updated,
    Reversed,
}

/// One audit record. Carries the directive as it stood after the action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub cycle: u64,
    pub at: DateTime<Utc>,
    pub action: HistoryAction,
    pub directive: AdjustmentDirective,
    pub trigger: Option<FrictionProfile>,
}
