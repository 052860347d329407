use crate::config::{ConfigError, EngineConfig};
use crate::directive::{AdjustmentDirective, HistoryEntry};
use crate::orchestrator::{CycleOrchestrator, CycleReport, CycleTrigger};
use crate::session::{ExplicitPreferences, Session, SessionId, SessionSummary};
use chrono::{DateTime, Utc};
use friction_core::{ActivationMap, FrictionCategory, FrictionProfile, Signal, SignalError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("session {0} ended while the call was in flight")]
    SessionEnded(SessionId),
    #[error("invalid signal: {0}")]
    InvalidSignal(#[from] SignalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub window_len: usize,
    /// Set when the signal is a qualifying event for an immediate cycle.
    pub trigger: Option<CycleTrigger>,
}

/// Read-only copy of every category slot after the latest cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSnapshot {
    pub session_id: SessionId,
    pub cycle: u64,
    pub adjustments: BTreeMap<FrictionCategory, Option<AdjustmentDirective>>,
}

impl AdjustmentSnapshot {
    pub fn get(&self, category: FrictionCategory) -> Option<&AdjustmentDirective> {
        self.adjustments.get(&category).and_then(Option::as_ref)
    }

    pub fn active_count(&self) -> usize {
        self.adjustments.values().filter(|d| d.is_some()).count()
    }
}

pub(crate) struct SessionSlot {
    ended: AtomicBool,
    session: Mutex<Session>,
}

impl SessionSlot {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Session registry plus the closed loop.
///
/// Sessions share nothing but configuration. `record` and `run_cycle` on the
/// same session serialize on that session's lock; different sessions run in
/// parallel.
pub struct FrictionEngine {
    config: EngineConfig,
    sessions: RwLock<HashMap<SessionId, Arc<SessionSlot>>>,
}

impl Default for FrictionEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl FrictionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn start_session(&self) -> SessionId {
        self.start_session_at(Utc::now())
    }

    pub fn start_session_at(&self, now: DateTime<Utc>) -> SessionId {
        let id = SessionId::new();
        let slot = Arc::new(SessionSlot {
            ended: AtomicBool::new(false),
            session: Mutex::new(Session::new(id, self.config.window, now)),
        });
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slot);
        info!("session {id} started");
        id
    }

    pub fn end_session(&self, id: SessionId) -> Result<SessionSummary, EngineError> {
        self.end_session_at(id, Utc::now())
    }

    /// Removes the session. A cycle still running on it publishes nothing.
    pub fn end_session_at(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
    ) -> Result<SessionSummary, EngineError> {
        let slot = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(EngineError::UnknownSession(id))?;
        slot.ended.store(true, Ordering::SeqCst);
        let summary = slot.lock().summary(now);
        info!(
            "session {id} ended after {} cycles ({} applied, {} reversed)",
            summary.cycles, summary.applied, summary.reversed
        );
        Ok(summary)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    /// Appends a signal to the session window. Invalid signals leave the window unchanged.
    pub fn record(&self, id: SessionId, signal: Signal) -> Result<RecordOutcome, EngineError> {
        let slot = self.slot(id)?;
        let mut session = slot.lock();
        if slot.ended.load(Ordering::SeqCst) {
            warn!("session {id}: signal dropped, session ended");
            return Err(EngineError::SessionEnded(id));
        }
        let trigger = CycleTrigger::for_signal(&signal);
        if let Err(err) = session.window.record(signal) {
            warn!("session {id}: rejected signal: {err}");
            return Err(err.into());
        }
        Ok(RecordOutcome {
            window_len: session.window.len(),
            trigger,
        })
    }

    pub fn run_cycle(&self, id: SessionId, trigger: CycleTrigger) -> Result<CycleReport, EngineError> {
        self.run_cycle_at(id, trigger, Utc::now())
    }

    pub fn run_cycle_at(
        &self,
        id: SessionId,
        trigger: CycleTrigger,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, EngineError> {
        let slot = self.slot(id)?;
        let mut session = slot.lock();
        let pending = CycleOrchestrator::new(&self.config).prepare(&session, trigger, now);
        if slot.ended.load(Ordering::SeqCst) {
            warn!("session {id}: cycle {} abandoned, session ended", pending.report().cycle);
            return Err(EngineError::SessionEnded(id));
        }
        Ok(pending.commit(&mut session))
    }

    pub fn current_adjustments(&self, id: SessionId) -> Result<AdjustmentSnapshot, EngineError> {
        self.with_session(id, |session| AdjustmentSnapshot {
            session_id: id,
            cycle: session.cycles(),
            adjustments: FrictionCategory::ALL
                .into_iter()
                .map(|c| (c, session.adaptation().active(c).cloned()))
                .collect(),
        })
    }

    pub fn history(&self, id: SessionId) -> Result<Vec<HistoryEntry>, EngineError> {
        self.with_session(id, |session| session.adaptation().history().to_vec())
    }

    pub fn latest_activation(&self, id: SessionId) -> Result<ActivationMap, EngineError> {
        self.with_session(id, |session| *session.activation())
    }

    pub fn current_profiles(
        &self,
        id: SessionId,
    ) -> Result<BTreeMap<FrictionCategory, FrictionProfile>, EngineError> {
        self.with_session(id, |session| session.profiles().clone())
    }

    pub fn preferences(&self, id: SessionId) -> Result<ExplicitPreferences, EngineError> {
        self.with_session(id, Session::preferences)
    }

    pub fn window_len(&self, id: SessionId) -> Result<usize, EngineError> {
        self.with_session(id, |session| session.window().len())
    }

    pub(crate) fn slot(&self, id: SessionId) -> Result<Arc<SessionSlot>, EngineError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownSession(id))
    }

    fn with_session<T>(
        &self,
        id: SessionId,
        read: impl FnOnce(&Session) -> T,
    ) -> Result<T, EngineError> {
        let slot = self.slot(id)?;
        let session = slot.lock();
        Ok(read(&session))
    }
}
