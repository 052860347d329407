use anyhow::Context;
use friction_core::{FrictionCategory, Metric};
use friction_engine::{CycleReport, Transition};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Loop metrics on an owned registry, one instance per engine.
pub struct FrictionMetrics {
    registry: Registry,
    pub cycles_total: IntCounterVec,
    pub activations_total: IntCounterVec,
    pub applied_total: IntCounterVec,
    pub reversals_total: IntCounterVec,
    pub diagnoser_failures_total: IntCounterVec,
    pub rejected_signals_total: IntCounterVec,
    pub sessions_ended_total: IntCounter,
    pub directives_active: IntGaugeVec,
}

impl FrictionMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("friction".into()), None)?;

        let cycles_total = IntCounterVec::new(
            Opts::new("cycles_total", "Closed-loop cycles run, by trigger"),
            &["trigger"],
        )?;
        let activations_total = IntCounterVec::new(
            Opts::new("activations_total", "Layer-1 true readings per category"),
            &["category"],
        )?;
        let applied_total = IntCounterVec::new(
            Opts::new("directives_applied_total", "Adjustment directives applied per category"),
            &["category"],
        )?;
        let reversals_total = IntCounterVec::new(
            Opts::new("directives_reversed_total", "Adjustment directives reversed per category"),
            &["category"],
        )?;
        let diagnoser_failures_total = IntCounterVec::new(
            Opts::new("diagnoser_failures_total", "Layer-2 diagnoser failures per category"),
            &["category"],
        )?;
        let rejected_signals_total = IntCounterVec::new(
            Opts::new("rejected_signals_total", "Signals rejected at record time, by metric"),
            &["metric"],
        )?;
        let sessions_ended_total =
            IntCounter::new("sessions_ended_total", "Sessions ended and removed")?;
        let directives_active = IntGaugeVec::new(
            Opts::new("directives_active", "Active directives per category after the last cycle"),
            &["category"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(activations_total.clone()))?;
        registry.register(Box::new(applied_total.clone()))?;
        registry.register(Box::new(reversals_total.clone()))?;
        registry.register(Box::new(diagnoser_failures_total.clone()))?;
        registry.register(Box::new(rejected_signals_total.clone()))?;
        registry.register(Box::new(sessions_ended_total.clone()))?;
        registry.register(Box::new(directives_active.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            activations_total,
            applied_total,
            reversals_total,
            diagnoser_failures_total,
            rejected_signals_total,
            sessions_ended_total,
            directives_active,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn observe_cycle(&self, report: &CycleReport) {
        self.cycles_total
            .with_label_values(&[report.trigger.as_str()])
            .inc();
        for category in report.activation.active() {
            self.activations_total
                .with_label_values(&[category.as_str()])
                .inc();
        }
        for failure in &report.failures {
            self.diagnoser_failures_total
                .with_label_values(&[failure.category.as_str()])
                .inc();
        }
        for transition in &report.transitions {
            let category = transition.category();
            match transition {
                Transition::Applied { .. } => {
                    self.applied_total.with_label_values(&[category.as_str()]).inc();
                    self.active_gauge(category).inc();
                }
                Transition::Reversed { .. } => {
                    self.reversals_total.with_label_values(&[category.as_str()]).inc();
                    self.active_gauge(category).dec();
                }
                Transition::Updated { .. } => {}
            }
        }
    }

    pub fn observe_rejection(&self, metric: Metric) {
        self.rejected_signals_total
            .with_label_values(&[metric.as_str()])
            .inc();
    }

    /// Drops the gauge contribution of a session's directives that were still active at end.
    pub fn observe_session_end(&self, still_active: &[FrictionCategory]) {
        self.sessions_ended_total.inc();
        for category in still_active {
            self.active_gauge(*category).dec();
        }
    }

    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("encoding friction metrics")?;
        String::from_utf8(buffer).context("metrics text is not utf-8")
    }

    fn active_gauge(&self, category: FrictionCategory) -> prometheus::IntGauge {
        self.directives_active.with_label_values(&[category.as_str()])
    }
}
