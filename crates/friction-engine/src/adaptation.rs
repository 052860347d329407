use crate::directive::{AdjustmentDirective, AdjustmentKind, HistoryAction, HistoryEntry};
use chrono::{DateTime, Utc};
use friction_core::{ActivationMap, Extent, FrictionCategory, FrictionProfile};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// What one cycle did to one category slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Transition {
    Applied {
        category: FrictionCategory,
        directive_id: Uuid,
        kind: AdjustmentKind,
        extent: Extent,
    },
    Updated {
        category: FrictionCategory,
        directive_id: Uuid,
        from: Extent,
        to: Extent,
    },
    Reversed {
        category: FrictionCategory,
        directive_id: Uuid,
        after_negatives: u32,
    },
}

impl Transition {
    pub fn category(&self) -> FrictionCategory {
        match self {
            Transition::Applied { category, .. }
            | Transition::Updated { category, .. }
            | Transition::Reversed { category, .. } => *category,
        }
    }
}

/// Reversible adjustment state for one session.
///
/// Each category owns one slot. A slot is empty or holds exactly one active
/// directive; a directive leaves the slot only by reversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptationState {
    active: BTreeMap<FrictionCategory, AdjustmentDirective>,
    negative_streak: BTreeMap<FrictionCategory, u32>,
    history: Vec<HistoryEntry>,
}

impl AdaptationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self, category: FrictionCategory) -> Option<&AdjustmentDirective> {
        self.active.get(&category)
    }

    pub fn active_directives(&self) -> impl Iterator<Item = &AdjustmentDirective> + '_ {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn negative_streak(&self, category: FrictionCategory) -> u32 {
        self.negative_streak.get(&category).copied().unwrap_or(0)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn count(&self, action: HistoryAction) -> usize {
        self.history.iter().filter(|e| e.action == action).count()
    }

    /// Runs every category slot through one cycle.
    ///
    /// A slot reads positive only when its Layer-1 bit is set and its
    /// diagnoser produced an actionable profile. An abstention, a failure
    /// (no profile at all) or a cleared bit is a negative reading, and
    /// `hysteresis` consecutive negatives (at least 1) reverse the directive.
    pub fn advance(
        &mut self,
        cycle: u64,
        activation: &ActivationMap,
        profiles: &BTreeMap<FrictionCategory, FrictionProfile>,
        hysteresis: u32,
        now: DateTime<Utc>,
    ) -> Vec<Transition> {
        let hysteresis = hysteresis.max(1);
        FrictionCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let detected = activation.get(category);
                let profile = profiles
                    .get(&category)
                    .filter(|p| detected && p.category == category && p.is_actionable());
                self.advance_slot(cycle, category, profile, hysteresis, now)
            })
            .collect()
    }

    fn advance_slot(
        &mut self,
        cycle: u64,
        category: FrictionCategory,
        profile: Option<&FrictionProfile>,
        hysteresis: u32,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let Some(directive) = self.active.get_mut(&category) else {
            self.negative_streak.insert(category, 0);
            let profile = profile?;
            let directive = AdjustmentDirective::from_profile(profile, now);
            info!(
                "applied {:?} for {} at {:?} ({})",
                directive.kind, category, directive.extent, directive.cause_hint
            );
            let transition = Transition::Applied {
                category,
                directive_id: directive.id,
                kind: directive.kind,
                extent: directive.extent,
            };
            self.push_history(cycle, now, HistoryAction::Applied, directive.clone(), Some(profile));
            self.active.insert(category, directive);
            return Some(transition);
        };

        if let Some(profile) = profile {
            self.negative_streak.insert(category, 0);
            let from = directive.extent;
            if !directive.refresh(profile, now) {
                return None;
            }
            let transition = Transition::Updated {
                category,
                directive_id: directive.id,
                from,
                to: directive.extent,
            };
            let snapshot = directive.clone();
            self.push_history(cycle, now, HistoryAction::Updated, snapshot, Some(profile));
            return Some(transition);
        }

        let streak = self.negative_streak.entry(category).or_insert(0);
        *streak += 1;
        let negatives = *streak;
        if negatives < hysteresis {
            return None;
        }

        let mut directive = self.active.remove(&category)?;
        directive.reverse(now);
        self.negative_streak.insert(category, 0);
        info!(
            "reversed {:?} for {} after {} negative cycles",
            directive.kind, category, negatives
        );
        let transition = Transition::Reversed {
            category,
            directive_id: directive.id,
            after_negatives: negatives,
        };
        self.push_history(cycle, now, HistoryAction::Reversed, directive, None);
        Some(transition)
    }

    fn push_history(
        &mut self,
        cycle: u64,
        at: DateTime<Utc>,
        action: HistoryAction,
        directive: AdjustmentDirective,
        trigger: Option<&FrictionProfile>,
    ) {
        let sequence = self.history.len() as u64;
        self.history.push(HistoryEntry {
            sequence,
            cycle,
            at,
            action,
            directive,
            trigger: trigger.cloned(),
        });
    }
}
