//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Runner-side event recorder."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use testbus_msg::{
    codec, log_event, AssertOutcome, DeliveryHandler, Event, EventChannel, EventDirection,
    MessagingError, SubscriptionId,
};
use tracing::warn;

/// Counts of recorded events by outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub exceptions: usize,
    pub traces: usize,
    pub completed: usize,
}

#[derive(Default)]
struct Journal {
    events: Vec<Event>,
    tally: Tally,
    undecodable: usize,
}

impl Journal {
    fn record(&mut self, event: Event) {
        match &event {
            Event::AssertResult {
                outcome: AssertOutcome::Pass,
                ..
            } => self.tally.passed += 1,
            Event::AssertResult {
                outcome: AssertOutcome::Fail,
                ..
            } => self.tally.failed += 1,
            Event::Exception { .. } => self.tally.exceptions += 1,
            Event::Trace { .. } => self.tally.traces += 1,
            Event::TestComplete { .. } => self.tally.completed += 1,
            _ => {}
        }
        self.events.push(event);
    }
}

#[derive(Default)]
struct Shared {
    journal: Mutex<Journal>,
    changed: Condvar,
}

/// What the external runner sees: every event on the address, decoded, in
/// arrival order.
pub struct EventRecorder {
    channel: Arc<dyn EventChannel>,
    address: String,
    subscription: SubscriptionId,
    shared: Arc<Shared>,
}

impl EventRecorder {
    /// Subscribe to `address` and start recording.
    pub fn attach(
        channel: Arc<dyn EventChannel>,
        address: impl Into<String>,
    ) -> Result<Self, MessagingError> {
        let address = address.into();
        let shared = Arc::new(Shared::default());

        let sink = shared.clone();
        let log_address = address.clone();
        let handler: DeliveryHandler = Arc::new(move |payload: &Bytes| {
            let mut journal = sink.journal.lock();
            match codec::decode(payload) {
                Ok(event) => {
                    log_event(EventDirection::Inbound, &log_address, &event);
                    journal.record(event);
                }
                Err(err) => {
                    warn!(address = %log_address, error = %err, "recorder dropped undecodable payload");
                    journal.undecodable += 1;
                }
            }
            sink.changed.notify_all();
        });
        let subscription = channel.subscribe(&address, handler)?;

        Ok(Self {
            channel,
            address,
            subscription,
            shared,
        })
    }

    /// Publish a `start_test` request the way the runner does.
    pub fn start_test(&self, name: impl Into<String>) -> Result<(), MessagingError> {
        let payload = codec::encode(&Event::start_test(name))?;
        self.channel.publish(&self.address, payload)
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.journal.lock().events.clone()
    }

    /// Recorded events minus the runner's own `start_test` requests.
    pub fn reported(&self) -> Vec<Event> {
        self.shared
            .journal
            .lock()
            .events
            .iter()
            .filter(|event| !matches!(event, Event::StartTest { .. }))
            .cloned()
            .collect()
    }

    pub fn tally(&self) -> Tally {
        self.shared.journal.lock().tally
    }

    /// Payloads that did not decode as events.
    pub fn undecodable(&self) -> usize {
        self.shared.journal.lock().undecodable
    }

    /// Block until at least `count` completions were recorded or `timeout` passes.
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait_for_completions(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut journal = self.shared.journal.lock();
        while journal.tally.completed < count {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .changed
                        .wait_until(&mut journal, deadline)
                        .timed_out()
                    {
                        return journal.tally.completed >= count;
                    }
                }
                None => self.shared.changed.wait(&mut journal),
            }
        }
        true
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        *self.shared.journal.lock() = Journal::default();
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        self.channel.unsubscribe(&self.address, self.subscription);
    }
}
