//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Event emission and the assertion API."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Everything here reports to the runner. Reporting never fails the caller:
//! encode and publish errors are logged and dropped. Assertions are the one
//! exception, and only for the test outcome itself: a false condition is
//! published first and then returned as an [`AssertionFailure`].

use std::backtrace::Backtrace;
use std::panic::Location;

use testbus_msg::types::EventKind;
use testbus_msg::{codec, log_event, Event, EventDirection, MessagingError};
use tracing::error;

use crate::error::AssertionFailure;
use crate::harness::Harness;

impl Harness {
    /// Encode `event` and publish it on the harness address.
    pub fn send_message(&self, event: &Event) {
        let inner = &self.inner;
        let sent = codec::encode(event)
            .and_then(|payload| inner.channel.publish(&inner.address, payload));
        match sent {
            Ok(()) => {
                log_event(EventDirection::Outbound, &inner.address, event);
                if let Some(metrics) = &inner.metrics {
                    metrics.observe_sent();
                }
            }
            Err(err) => self.reporting_failed(event.kind(), &err),
        }
    }

    /// Publish a payload-free event of the given kind.
    ///
    /// Kinds that require fields cannot be sent this way; the request is
    /// logged as a reporting failure and nothing is published.
    pub fn send_event(&self, kind: EventKind) {
        match Event::bare(kind) {
            Ok(event) => self.send_message(&event),
            Err(err) => self.reporting_failed(kind, &MessagingError::Schema(err)),
        }
    }

    fn reporting_failed(&self, kind: EventKind, err: &MessagingError) {
        error!(
            address = %self.inner.address,
            kind = kind.as_ref(),
            error = %err,
            "Failed to send message"
        );
        if let Some(metrics) = &self.inner.metrics {
            metrics.observe_reporting_failure();
        }
    }

    /// Report the outcome of `condition`.
    ///
    /// Returns `Err` after publishing a failed `assert_result` so test bodies
    /// can stop with `?`.
    #[track_caller]
    pub fn assert(&self, condition: bool) -> Result<(), AssertionFailure> {
        self.report_assertion(condition, None, Location::caller())
    }

    /// Like [`Harness::assert`], attaching `message` to the event and failure.
    #[track_caller]
    pub fn assert_with(
        &self,
        condition: bool,
        message: impl Into<String>,
    ) -> Result<(), AssertionFailure> {
        self.report_assertion(condition, Some(message.into()), Location::caller())
    }

    fn report_assertion(
        &self,
        condition: bool,
        message: Option<String>,
        location: &'static Location<'static>,
    ) -> Result<(), AssertionFailure> {
        if condition {
            self.send_message(&Event::assert_pass(message));
            return Ok(());
        }
        let stacktrace = call_site_trace(location);
        self.send_message(&Event::assert_fail(message.clone(), stacktrace));
        Err(AssertionFailure::new(message, location))
    }

    pub fn app_ready(&self) {
        self.send_event(EventKind::AppReady);
    }

    pub fn app_stopped(&self) {
        self.send_event(EventKind::AppStopped);
    }

    /// Signal that the running test has finished.
    pub fn test_complete(&self) {
        self.send_message(&Event::test_complete());
    }

    /// Ask the runner side to start `name`.
    pub fn start_test(&self, name: impl Into<String>) {
        self.send_message(&Event::start_test(name));
    }

    /// Report a failure that happened outside the assertion flow.
    pub fn exception(&self, error: &anyhow::Error, message: impl Into<String>) {
        self.send_message(&Event::exception(message, format!("{:?}", error)));
    }

    /// Free-form diagnostic for the runner's log.
    pub fn trace(&self, message: impl Into<String>) {
        self.send_message(&Event::trace(message));
    }
}

fn call_site_trace(location: &Location<'_>) -> String {
    format!("at {}\n{}", location, Backtrace::force_capture())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prometheus::Registry;
    use testbus_msg::{AssertOutcome, InMemoryChannel};
    use testbus_rt::ContextId;

    use super::*;
    use crate::harness::tests::{published, ScriptedContexts};
    use crate::HarnessMetrics;

    const ADDRESS: &str = "events";

    fn harness() -> (Harness, InMemoryChannel) {
        let channel = InMemoryChannel::new();
        let harness = Harness::new(
            Arc::new(channel.clone()),
            ScriptedContexts::bound(ContextId::next()),
        );
        (harness, channel)
    }

    #[test]
    fn passing_assert_emits_one_pass_event() {
        let (harness, channel) = harness();
        harness.assert(2 + 2 == 4).expect("assertion holds");
        harness.assert_with(true, "with note").expect("assertion holds");
        assert_eq!(
            published(&channel, ADDRESS),
            vec![
                Event::assert_pass(None),
                Event::assert_pass(Some("with note".into()))
            ]
        );
    }

    #[test]
    fn failing_assert_emits_then_returns_failure() {
        let (harness, channel) = harness();
        let line = line!() + 1;
        let failure = harness.assert_with(false, "boom").unwrap_err();
        assert_eq!(failure.message(), Some("boom"));
        assert!(failure
            .location()
            .contains(&format!("emitter.rs:{}:", line)));

        let events = published(&channel, ADDRESS);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::AssertResult {
                outcome,
                message,
                stacktrace,
            } => {
                assert_eq!(*outcome, AssertOutcome::Fail);
                assert_eq!(message.as_deref(), Some("boom"));
                let trace = stacktrace.as_deref().expect("stacktrace on failure");
                assert!(trace.starts_with("at "));
                assert!(trace.contains("emitter.rs"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn failing_assert_without_message() {
        let (harness, channel) = harness();
        let failure = harness.assert(false).unwrap_err();
        assert_eq!(failure.message(), None);
        assert!(matches!(
            &published(&channel, ADDRESS)[0],
            Event::AssertResult { message: None, stacktrace: Some(trace), .. } if !trace.is_empty()
        ));
    }

    #[test]
    fn lifecycle_helpers_emit_their_events() {
        let (harness, channel) = harness();
        harness.app_ready();
        harness.start_test("testFoo");
        harness.trace("halfway");
        harness.test_complete();
        harness.app_stopped();
        assert_eq!(
            published(&channel, ADDRESS),
            vec![
                Event::AppReady,
                Event::start_test("testFoo"),
                Event::trace("halfway"),
                Event::test_complete(),
                Event::AppStopped,
            ]
        );
    }

    #[test]
    fn exception_carries_error_chain() {
        let (harness, channel) = harness();
        let error = anyhow::anyhow!("disk unplugged").context("writing fixture");
        harness.exception(&error, "fixture setup failed");
        match &published(&channel, ADDRESS)[0] {
            Event::Exception {
                message,
                stacktrace,
            } => {
                assert_eq!(message, "fixture setup failed");
                assert!(stacktrace.contains("writing fixture"));
                assert!(stacktrace.contains("disk unplugged"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn send_event_only_sends_bare_kinds() {
        let (harness, channel) = harness();
        harness.send_event(EventKind::AppReady);
        harness.send_event(EventKind::StartTest);
        assert_eq!(published(&channel, ADDRESS), vec![Event::AppReady]);
    }

    #[test]
    fn reporting_failures_are_swallowed() {
        let channel = InMemoryChannel::new();
        let registry = Registry::new();
        let metrics = HarnessMetrics::register(&registry).expect("metrics");
        let harness = Harness::builder(
            Arc::new(channel.clone()),
            ScriptedContexts::bound(ContextId::next()),
        )
        .metrics(metrics.clone())
        .build();

        harness.trace("before close");
        channel.close();
        harness.trace("lost");
        harness.test_complete();
        assert!(harness.assert(true).is_ok());
        // the outcome still reaches the caller even though the report was lost
        assert!(harness.assert(false).is_err());

        assert_eq!(metrics.events_sent(), 1);
        assert_eq!(metrics.reporting_failures(), 4);
        assert_eq!(channel.published(ADDRESS).len(), 1);
    }
}
