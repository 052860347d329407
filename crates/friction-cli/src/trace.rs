//! JSONL replay traces.
//!
//! One event per line:
//! `{"event":"signal","signal":{...}}` appends a signal,
//! `{"event":"cycle","trigger":"tick","at":"2026-03-02T09:00:00Z"}` runs a cycle.
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use friction_core::Signal;
use friction_engine::{CycleReport, CycleTrigger, EngineError, FrictionEngine, HistoryEntry, SessionSummary};
use log::{info, warn};
use prometheus_bridge::{FrictionMetrics, ObservedEngine};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TraceEvent {
    Signal { signal: Signal },
    Cycle { trigger: CycleTrigger, at: DateTime<Utc> },
}

pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading trace line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .with_context(|| format!("trace line {} is not a valid event", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[derive(Debug, Serialize)]
pub struct ReplayOutcome {
    pub cycles: Vec<CycleReport>,
    pub rejected: usize,
    pub history: Vec<HistoryEntry>,
    pub summary: SessionSummary,
}

/// Runs every event through one fresh session.
///
/// Rejected signals are logged and counted; they never stop the replay. With
/// `auto_cycle`, a qualifying signal runs a cycle at its own timestamp.
pub fn replay(
    engine: &FrictionEngine,
    metrics: &FrictionMetrics,
    events: Vec<TraceEvent>,
    auto_cycle: bool,
) -> Result<ReplayOutcome> {
    let observed = ObservedEngine::new(engine, metrics);
    let started = events
        .iter()
        .map(|e| match e {
            TraceEvent::Signal { signal } => signal.timestamp,
            TraceEvent::Cycle { at, .. } => *at,
        })
        .min()
        .unwrap_or_else(Utc::now);
    let id = engine.start_session_at(started);

    let mut cycles = Vec::new();
    let mut rejected = 0;
    for event in events {
        match event {
            TraceEvent::Signal { signal } => {
                let at = signal.timestamp;
                match observed.record(id, signal) {
                    Ok(outcome) => {
                        if let (true, Some(trigger)) = (auto_cycle, outcome.trigger) {
                            cycles.push(observed.run_cycle_at(id, trigger, at)?);
                        }
                    }
                    Err(EngineError::InvalidSignal(err)) => {
                        warn!("skipping signal: {err}");
                        rejected += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            TraceEvent::Cycle { trigger, at } => {
                cycles.push(observed.run_cycle_at(id, trigger, at)?);
            }
        }
    }

    let history = engine.history(id)?;
    let summary = observed.end_session(id)?;
    info!(
        "replayed {} cycles, {} rejected signals, {} directives applied",
        cycles.len(),
        rejected,
        summary.applied
    );
    Ok(ReplayOutcome {
        cycles,
        rejected,
        history,
        summary,
    })
}
