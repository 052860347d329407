use crate::FrictionMetrics;
use chrono::{DateTime, Utc};
use friction_core::Signal;
use friction_engine::{
    CycleReport, CycleTrigger, EngineError, FrictionEngine, RecordOutcome, SessionId,
    SessionSummary,
};
use log::debug;

/// Engine calls that keep a [`FrictionMetrics`] in step with what they publish.
pub struct ObservedEngine<'a> {
    engine: &'a FrictionEngine,
    metrics: &'a FrictionMetrics,
}

impl<'a> ObservedEngine<'a> {
    pub fn new(engine: &'a FrictionEngine, metrics: &'a FrictionMetrics) -> Self {
        Self { engine, metrics }
    }

    pub fn record(&self, id: SessionId, signal: Signal) -> Result<RecordOutcome, EngineError> {
        let metric = signal.metric;
        let outcome = self.engine.record(id, signal);
        if let Err(EngineError::InvalidSignal(_)) = &outcome {
            self.metrics.observe_rejection(metric);
        }
        outcome
    }

    pub fn run_cycle_at(
        &self,
        id: SessionId,
        trigger: CycleTrigger,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, EngineError> {
        let report = self.engine.run_cycle_at(id, trigger, now)?;
        self.metrics.observe_cycle(&report);
        debug!("observed cycle {} for session {id}", report.cycle);
        Ok(report)
    }

    pub fn end_session(&self, id: SessionId) -> Result<SessionSummary, EngineError> {
        let summary = self.engine.end_session(id)?;
        self.metrics.observe_session_end(&summary.still_active);
        Ok(summary)
    }
}
