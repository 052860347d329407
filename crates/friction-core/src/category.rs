use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Observation category a raw signal belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SignalCategory {
    Access,
    Interaction,
    CognitiveLoad,
    Motivation,
    Transfer,
    Preference,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 6] = [
        SignalCategory::Access,
        SignalCategory::Interaction,
        SignalCategory::CognitiveLoad,
        SignalCategory::Motivation,
        SignalCategory::Transfer,
        SignalCategory::Preference,
    ];
}

/// The locked palette of friction categories. Nothing is added at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FrictionCategory {
    Access,
    CognitiveLoad,
    RegulationMotivation,
    InteractionFeedback,
    TransferMeaning,
}

impl FrictionCategory {
    pub const ALL: [FrictionCategory; 5] = [
        FrictionCategory::Access,
        FrictionCategory::CognitiveLoad,
        FrictionCategory::RegulationMotivation,
        FrictionCategory::InteractionFeedback,
        FrictionCategory::TransferMeaning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FrictionCategory::Access => "access",
            FrictionCategory::CognitiveLoad => "cognitive-load",
            FrictionCategory::RegulationMotivation => "regulation-motivation",
            FrictionCategory::InteractionFeedback => "interaction-feedback",
            FrictionCategory::TransferMeaning => "transfer-meaning",
        }
    }

    pub fn index(self) -> usize {
        match self {
            FrictionCategory::Access => 0,
            FrictionCategory::CognitiveLoad => 1,
            FrictionCategory::RegulationMotivation => 2,
            FrictionCategory::InteractionFeedback => 3,
            FrictionCategory::TransferMeaning => 4,
        }
    }
}

impl fmt::Display for FrictionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content modality a step can be delivered in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    Text,
    Video,
    InteractiveTask,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Video, Modality::InteractiveTask];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Video => "video",
            Modality::InteractiveTask => "interactive-task",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown modality `{s}`"))
    }
}
