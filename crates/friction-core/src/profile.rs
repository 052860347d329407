use crate::category::{FrictionCategory, Modality};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Extent {
    None,
    Mild,
    Moderate,
    Severe,
}

impl Extent {
    pub fn is_actionable(self) -> bool {
        self >= Extent::Mild
    }

    /// One level up, saturating at `Severe`. `None` stays `None`.
    pub fn escalate(self) -> Self {
        match self {
            Extent::None => Extent::None,
            Extent::Mild => Extent::Moderate,
            Extent::Moderate | Extent::Severe => Extent::Severe,
        }
    }
}

/// Lower boundaries of the mild, moderate and severe bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExtentBuckets {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl ExtentBuckets {
    pub const fn new(mild: f64, moderate: f64, severe: f64) -> Self {
        Self {
            mild,
            moderate,
            severe,
        }
    }

    pub fn classify(&self, value: f64) -> Extent {
        if value >= self.severe {
            Extent::Severe
        } else if value >= self.moderate {
            Extent::Moderate
        } else if value >= self.mild {
            Extent::Mild
        } else {
            Extent::None
        }
    }

    pub fn is_ordered(&self) -> bool {
        [self.mild, self.moderate, self.severe]
            .iter()
            .all(|b| b.is_finite())
            && self.mild < self.moderate
            && self.moderate < self.severe
    }
}

/// Layer-2 result for one active category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrictionProfile {
    pub category: FrictionCategory,
    pub extent: Extent,
    pub affected_modalities: BTreeSet<Modality>,
    pub cause_hint: String,
    /// Normalized strength of the evidence, in [0, 1].
    pub score: f64,
}

impl FrictionProfile {
    pub fn abstain(category: FrictionCategory, cause_hint: impl Into<String>) -> Self {
        Self {
            category,
            extent: Extent::None,
            affected_modalities: BTreeSet::new(),
            cause_hint: cause_hint.into(),
            score: 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.extent.is_actionable()
    }
}

/// Layer-1 output: one bit per friction category, rebuilt every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationMap {
    bits: [bool; 5],
}

impl ActivationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: FrictionCategory, active: bool) {
        self.bits[category.index()] = active;
    }

    pub fn get(&self, category: FrictionCategory) -> bool {
        self.bits[category.index()]
    }

    pub fn active(&self) -> impl Iterator<Item = FrictionCategory> + '_ {
        FrictionCategory::ALL.into_iter().filter(|c| self.get(*c))
    }

    pub fn any(&self) -> bool {
        self.bits.iter().any(|b| *b)
    }

    pub fn to_map(&self) -> BTreeMap<FrictionCategory, bool> {
        FrictionCategory::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .collect()
    }
}

impl FromIterator<(FrictionCategory, bool)> for ActivationMap {
    fn from_iter<I: IntoIterator<Item = (FrictionCategory, bool)>>(iter: I) -> Self {
        let mut map = ActivationMap::new();
        for (category, active) in iter {
            map.set(category, active);
        }
        map
    }
}

impl Serialize for ActivationMap {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ActivationMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<FrictionCategory, bool>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}
