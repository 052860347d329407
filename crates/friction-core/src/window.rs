use crate::category::SignalCategory;
use crate::signal::{Metric, Signal, SignalError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::vec_deque;
use std::collections::{BTreeMap, VecDeque};

static EMPTY_LANE: VecDeque<Signal> = VecDeque::new();

/// Longest accepted age span: one year.
pub const MAX_RETENTION_SECS: f64 = 365.0 * 24.0 * 3600.0;

/// Retention bounds for a session's signal window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum samples kept per observation category (K).
    pub capacity_per_category: usize,
    /// Age span in seconds, measured back from the newest recorded sample (T).
    pub retention_secs: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity_per_category: 64,
            retention_secs: 900.0,
        }
    }
}

impl WindowConfig {
    /// `None` when the span does not fit a `Duration`.
    pub fn retention(&self) -> Option<Duration> {
        secs_to_duration(self.retention_secs)
    }
}

pub fn secs_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_milliseconds((secs * 1000.0).round() as i64)
}

/// Rolling, append-only buffer of recent signals for one session.
///
/// Each observation category has its own lane kept in ascending timestamp
/// order. Lanes are trimmed to the capacity and age span after every
/// successful `record`.
#[derive(Debug, Clone, Default)]
pub struct SignalWindow {
    config: WindowConfig,
    lanes: BTreeMap<SignalCategory, VecDeque<Signal>>,
    newest: Option<DateTime<Utc>>,
}

impl SignalWindow {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            lanes: BTreeMap::new(),
            newest: None,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.lanes.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, category: SignalCategory) -> usize {
        self.lanes.get(&category).map_or(0, VecDeque::len)
    }

    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.newest
    }

    /// Oldest timestamp still inside the age span. `None` when nothing has
    /// been recorded or the span reaches past the representable range.
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        let newest = self.newest?;
        newest.checked_sub_signed(self.config.retention()?)
    }

    /// Validates and appends a signal. On error the window is left untouched.
    pub fn record(&mut self, signal: Signal) -> Result<(), SignalError> {
        signal.validate()?;

        if let Some(cutoff) = self.cutoff() {
            if signal.timestamp < cutoff {
                return Err(SignalError::Stale {
                    timestamp: signal.timestamp,
                    cutoff,
                });
            }
        }

        let timestamp = signal.timestamp;
        let lane = self.lanes.entry(signal.category).or_default();
        // equal timestamps keep arrival order
        let pos = lane.partition_point(|s| s.timestamp <= timestamp);
        lane.insert(pos, signal);

        self.newest = Some(self.newest.map_or(timestamp, |n| n.max(timestamp)));
        self.evict();
        Ok(())
    }

    fn evict(&mut self) {
        let cutoff = self.cutoff();
        let capacity = self.config.capacity_per_category;
        for lane in self.lanes.values_mut() {
            if let Some(cutoff) = cutoff {
                while lane.front().map_or(false, |s| s.timestamp < cutoff) {
                    lane.pop_front();
                }
            }
            while lane.len() > capacity {
                lane.pop_front();
            }
        }
    }

    /// Signals of one category, ascending, optionally limited to the last `span`.
    pub fn view(&self, category: SignalCategory, span: Option<Duration>) -> SignalView<'_> {
        SignalView {
            inner: self.lane(category).iter(),
            metric: None,
            since: self.since(span),
        }
    }

    /// Same as [`SignalWindow::view`], restricted to one metric.
    pub fn view_metric(&self, metric: Metric, span: Option<Duration>) -> SignalView<'_> {
        SignalView {
            inner: self.lane(metric.category()).iter(),
            metric: Some(metric),
            since: self.since(span),
        }
    }

    /// The most recent `n` samples of a metric, ascending.
    pub fn latest(&self, metric: Metric, n: usize) -> Vec<&Signal> {
        let mut recent: Vec<&Signal> = self.view_metric(metric, None).rev().take(n).collect();
        recent.reverse();
        recent
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> + '_ {
        self.lanes.values().flat_map(VecDeque::iter)
    }

    fn lane(&self, category: SignalCategory) -> &VecDeque<Signal> {
        self.lanes.get(&category).unwrap_or(&EMPTY_LANE)
    }

    fn since(&self, span: Option<Duration>) -> Option<DateTime<Utc>> {
        match (span, self.newest) {
            (Some(span), Some(newest)) => newest.checked_sub_signed(span),
            _ => None,
        }
    }
}

/// Lazy, restartable view over one window lane. Clone it to iterate again.
#[derive(Debug, Clone)]
pub struct SignalView<'a> {
    inner: vec_deque::Iter<'a, Signal>,
    metric: Option<Metric>,
    since: Option<DateTime<Utc>>,
}

impl<'a> SignalView<'a> {
    fn admits(&self, signal: &Signal) -> bool {
        self.metric.map_or(true, |m| signal.metric == m)
            && self.since.map_or(true, |since| signal.timestamp >= since)
    }
}

impl<'a> Iterator for SignalView<'a> {
    type Item = &'a Signal;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let signal = self.inner.next()?;
            if self.admits(signal) {
                return Some(signal);
            }
        }
    }
}

impl<'a> DoubleEndedIterator for SignalView<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let signal = self.inner.next_back()?;
            if self.admits(signal) {
                return Some(signal);
            }
        }
    }
}
