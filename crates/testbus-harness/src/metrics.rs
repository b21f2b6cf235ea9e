//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Prometheus counters for harness activity."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use prometheus::{IntCounter, Opts, Registry};

/// Prometheus metric handles for harness activity.
#[derive(Clone)]
pub struct HarnessMetrics {
    events_sent: IntCounter,
    reporting_failures: IntCounter,
    dispatches: IntCounter,
    dispatch_failures: IntCounter,
}

impl HarnessMetrics {
    /// Register harness metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let events_sent = IntCounter::with_opts(Opts::new(
            "harness_events_sent_total",
            "Events published to the runner",
        ))?;
        let reporting_failures = IntCounter::with_opts(Opts::new(
            "harness_reporting_failures_total",
            "Events that could not be encoded or published",
        ))?;
        let dispatches = IntCounter::with_opts(Opts::new(
            "harness_dispatches_total",
            "Registered tests started by a start_test event",
        ))?;
        let dispatch_failures = IntCounter::with_opts(Opts::new(
            "harness_dispatch_failures_total",
            "Test bodies that returned an error or panicked",
        ))?;

        registry.register(Box::new(events_sent.clone()))?;
        registry.register(Box::new(reporting_failures.clone()))?;
        registry.register(Box::new(dispatches.clone()))?;
        registry.register(Box::new(dispatch_failures.clone()))?;

        Ok(Self {
            events_sent,
            reporting_failures,
            dispatches,
            dispatch_failures,
        })
    }

    pub fn observe_sent(&self) {
        self.events_sent.inc();
    }

    pub fn observe_reporting_failure(&self) {
        self.reporting_failures.inc();
    }

    pub fn observe_dispatch(&self) {
        self.dispatches.inc();
    }

    pub fn observe_dispatch_failure(&self) {
        self.dispatch_failures.inc();
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent.get()
    }

    pub fn reporting_failures(&self) -> u64 {
        self.reporting_failures.get()
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches.get()
    }

    pub fn dispatch_failures(&self) -> u64 {
        self.dispatch_failures.get()
    }
}
