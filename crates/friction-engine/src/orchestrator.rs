use crate::adaptation::{AdaptationState, Transition};
use crate::config::EngineConfig;
use crate::session::{Session, SessionId};
use chrono::{DateTime, Utc};
use friction_core::{ActivationMap, FrictionCategory, FrictionProfile, Metric, Signal, SignalWindow};
use friction_guards::{DiagnoserFailure, FrictionGuards};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleTrigger {
    Tick,
    StepTransition,
    ConfusionReport,
    PreferenceChange,
    Manual,
}

impl CycleTrigger {
    pub const ALL: [CycleTrigger; 5] = [
        CycleTrigger::Tick,
        CycleTrigger::StepTransition,
        CycleTrigger::ConfusionReport,
        CycleTrigger::PreferenceChange,
        CycleTrigger::Manual,
    ];

    /// The qualifying event a recorded signal implies, if any.
    pub fn for_signal(signal: &Signal) -> Option<Self> {
        match signal.metric {
            Metric::StepDuration => Some(CycleTrigger::StepTransition),
            Metric::ConfusionReport => Some(CycleTrigger::ConfusionReport),
            Metric::ExplanationStyle | Metric::PreferredModality => {
                Some(CycleTrigger::PreferenceChange)
            }
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleTrigger::Tick => "tick",
            CycleTrigger::StepTransition => "step-transition",
            CycleTrigger::ConfusionReport => "confusion-report",
            CycleTrigger::PreferenceChange => "preference-change",
            CycleTrigger::Manual => "manual",
        }
    }
}

impl fmt::Display for CycleTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer-1 and Layer-2 output for one window snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub activation: ActivationMap,
    /// Includes abstentions (extent `none`).
    pub profiles: BTreeMap<FrictionCategory, FrictionProfile>,
    pub failures: Vec<DiagnoserFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub session_id: SessionId,
    pub cycle: u64,
    pub trigger: CycleTrigger,
    pub at: DateTime<Utc>,
    pub window_len: usize,
    pub activation: ActivationMap,
    pub profiles: BTreeMap<FrictionCategory, FrictionProfile>,
    pub failures: Vec<DiagnoserFailure>,
    pub transitions: Vec<Transition>,
    pub active_directives: usize,
}

/// Everything one cycle wants to publish. Nothing in the session changes
/// until [`PendingCycle::commit`].
#[derive(Debug, Clone)]
pub struct PendingCycle {
    adaptation: AdaptationState,
    evaluation: Evaluation,
    report: CycleReport,
}

impl PendingCycle {
    pub fn report(&self) -> &CycleReport {
        &self.report
    }

    pub fn commit(self, session: &mut Session) -> CycleReport {
        session.activation = self.evaluation.activation;
        session.profiles = self
            .evaluation
            .profiles
            .into_iter()
            .filter(|(_, p)| p.is_actionable())
            .collect();
        session.adaptation = self.adaptation;
        session.cycles = self.report.cycle;
        session.last_cycle_at = Some(self.report.at);
        self.report
    }
}

/// The closed loop step function. Holds configuration only.
#[derive(Debug, Clone, Copy)]
pub struct CycleOrchestrator<'a> {
    guards: &'a FrictionGuards,
    hysteresis: u32,
}

impl<'a> CycleOrchestrator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            guards: &config.guards,
            hysteresis: config.hysteresis,
        }
    }

    pub fn evaluate(&self, window: &SignalWindow) -> Evaluation {
        let activation = self.guards.detect_all(window);
        diagnose_active(activation, |category| self.guards.diagnose(category, window))
    }

    pub fn prepare(&self, session: &Session, trigger: CycleTrigger, now: DateTime<Utc>) -> PendingCycle {
        let evaluation = self.evaluate(&session.window);
        self.prepare_with(session, trigger, now, evaluation)
    }

    /// Same as [`CycleOrchestrator::prepare`] with an already computed evaluation.
    pub fn prepare_with(
        &self,
        session: &Session,
        trigger: CycleTrigger,
        now: DateTime<Utc>,
        evaluation: Evaluation,
    ) -> PendingCycle {
        let cycle = session.cycles + 1;
        let mut adaptation = session.adaptation.clone();
        let transitions = adaptation.advance(
            cycle,
            &evaluation.activation,
            &evaluation.profiles,
            self.hysteresis,
            now,
        );
        debug!(
            "session {} cycle {} ({}): {} transition(s)",
            session.id(),
            cycle,
            trigger,
            transitions.len()
        );

        let report = CycleReport {
            session_id: session.id(),
            cycle,
            trigger,
            at: now,
            window_len: session.window.len(),
            activation: evaluation.activation,
            profiles: evaluation.profiles.clone(),
            failures: evaluation.failures.clone(),
            transitions,
            active_directives: adaptation.active_count(),
        };
        PendingCycle {
            adaptation,
            evaluation,
            report,
        }
    }
}

/// Runs `diagnose` for every active category, one at a time.
///
/// An error or panic in one category is recorded as a failure for that
/// category, which then has no profile this cycle; the others proceed.
/// The Layer-1 bit is left as detected, and the adaptation state reads the
/// missing profile as a negative for that slot.
pub fn diagnose_active<F>(activation: ActivationMap, mut diagnose: F) -> Evaluation
where
    F: FnMut(FrictionCategory) -> Result<FrictionProfile, DiagnoserFailure>,
{
    let mut profiles = BTreeMap::new();
    let mut failures = Vec::new();

    let active: Vec<FrictionCategory> = activation.active().collect();
    for category in active {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| diagnose(category))) {
            Ok(Ok(profile)) if profile.category == category => Ok(profile),
            Ok(Ok(profile)) => Err(DiagnoserFailure::new(
                category,
                format!("returned a profile for {}", profile.category),
            )),
            Ok(Err(failure)) => Err(failure),
            Err(payload) => Err(DiagnoserFailure::new(category, panic_reason(payload.as_ref()))),
        };
        match outcome {
            Ok(profile) => {
                profiles.insert(category, profile);
            }
            Err(failure) => {
                warn!("{failure}");
                failures.push(failure);
            }
        }
    }

    Evaluation {
        activation,
        profiles,
        failures,
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
