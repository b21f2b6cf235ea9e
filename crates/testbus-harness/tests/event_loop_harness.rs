//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "test"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Harness driven by a runner over a shared channel and event loops."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use testbus_common::init_test_tracing;
use testbus_harness::{EventRecorder, Harness, HarnessError, TestEntry};
use testbus_msg::{AssertOutcome, Event, InMemoryChannel};
use testbus_rt::{EventLoop, RuntimeContexts};

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    channel: InMemoryChannel,
    event_loop: EventLoop,
    harness: Harness,
    recorder: EventRecorder,
}

impl Fixture {
    fn new() -> Self {
        init_test_tracing();
        let channel = InMemoryChannel::new();
        let event_loop = EventLoop::spawn("harness-under-test").expect("spawn loop");
        let loop_channel = channel.clone();
        let harness = event_loop
            .run(move || Harness::new(Arc::new(loop_channel), Arc::new(RuntimeContexts)))
            .expect("create harness on loop");
        let recorder =
            EventRecorder::attach(Arc::new(channel.clone()), harness.address()).expect("recorder");
        Self {
            channel,
            event_loop,
            harness,
            recorder,
        }
    }

    fn register_tests(&self, entries: Vec<TestEntry>) {
        let harness = self.harness.clone();
        self.event_loop
            .run(move || harness.register_tests(entries))
            .expect("run on loop")
            .expect("register tests");
    }

    fn teardown(self) {
        let harness = self.harness.clone();
        self.event_loop
            .run(move || harness.unregister_all())
            .expect("unregister on loop");
        self.event_loop.shutdown();
    }
}

#[test]
fn runner_drives_a_passing_test() {
    let fixture = Fixture::new();
    let harness = fixture.harness.clone();
    fixture.register_tests(vec![TestEntry::new("testFoo", move || {
        harness.assert(true)?;
        harness.test_complete();
        Ok(())
    })]);

    fixture.recorder.start_test("testFoo").expect("start test");
    assert!(fixture.recorder.wait_for_completions(1, WAIT));
    fixture.event_loop.flush().expect("flush");

    assert_eq!(
        fixture.recorder.events(),
        vec![
            Event::start_test("testFoo"),
            Event::assert_pass(None),
            Event::test_complete(),
        ]
    );
    fixture.teardown();
}

#[test]
fn failing_assert_still_reaches_the_runner() {
    let fixture = Fixture::new();
    let harness = fixture.harness.clone();
    fixture.register_tests(vec![TestEntry::new("testBoom", move || {
        let outcome = harness.assert_with(false, "boom");
        harness.test_complete();
        outcome?;
        Ok(())
    })]);

    fixture.recorder.start_test("testBoom").expect("start test");
    assert!(fixture.recorder.wait_for_completions(1, WAIT));

    let reported = fixture.recorder.reported();
    assert_eq!(reported.len(), 2);
    match &reported[0] {
        Event::AssertResult {
            outcome,
            message,
            stacktrace,
        } => {
            assert_eq!(*outcome, AssertOutcome::Fail);
            assert_eq!(message.as_deref(), Some("boom"));
            assert!(stacktrace.as_deref().is_some_and(|trace| !trace.is_empty()));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(reported[1], Event::test_complete());
    fixture.teardown();
}

#[test]
fn check_context_passes_on_the_owning_loop() {
    let fixture = Fixture::new();
    let harness = fixture.harness.clone();
    fixture.register_tests(vec![TestEntry::new("testContext", move || {
        harness.check_context()?;
        harness.test_complete();
        Ok(())
    })]);

    fixture.recorder.start_test("testContext").expect("start test");
    assert!(fixture.recorder.wait_for_completions(1, WAIT));
    let tally = fixture.recorder.tally();
    assert_eq!(tally.passed, 2);
    assert_eq!(tally.failed, 0);
    fixture.teardown();
}

#[test]
fn check_context_fails_from_another_loop() {
    let fixture = Fixture::new();
    assert_eq!(
        fixture.harness.owning_context(),
        Some(fixture.event_loop.id())
    );
    assert_eq!(
        fixture.harness.owning_thread(),
        Some(fixture.event_loop.thread_id())
    );

    let other = EventLoop::spawn("intruder").expect("spawn second loop");
    let harness = fixture.harness.clone();
    let result = other
        .run(move || harness.check_context())
        .expect("run on second loop");
    other.shutdown();

    let err = result.unwrap_err();
    assert!(matches!(err, HarnessError::Assertion(_)));
    assert_eq!(fixture.recorder.tally().failed, 1);
    fixture.teardown();
}

#[test]
fn unknown_and_unregistered_tests_are_ignored() {
    let fixture = Fixture::new();
    let harness = fixture.harness.clone();
    fixture.register_tests(vec![TestEntry::new("testFoo", move || {
        harness.test_complete();
        Ok(())
    })]);

    fixture.recorder.start_test("testMissing").expect("start unknown");
    fixture.event_loop.flush().expect("flush");
    assert!(fixture.recorder.reported().is_empty());

    let harness = fixture.harness.clone();
    fixture
        .event_loop
        .run(move || harness.unregister_all())
        .expect("unregister");
    assert_eq!(fixture.channel.subscriber_count(fixture.harness.address()), 1);

    fixture.recorder.start_test("testFoo").expect("start after unregister");
    fixture.event_loop.flush().expect("flush");
    assert!(!fixture.recorder.wait_for_completions(1, Duration::from_millis(50)));
    fixture.teardown();
}

#[test]
fn tests_registered_off_loop_still_run_on_the_owning_loop() {
    let fixture = Fixture::new();
    let harness = fixture.harness.clone();
    fixture
        .harness
        .register_tests(vec![TestEntry::new("testOffLoop", move || {
            harness.check_context()?;
            harness.test_complete();
            Ok(())
        })])
        .expect("register from the test thread");

    fixture.recorder.start_test("testOffLoop").expect("start test");
    assert!(fixture.recorder.wait_for_completions(1, WAIT));
    let tally = fixture.recorder.tally();
    assert_eq!(tally.passed, 2);
    assert_eq!(tally.failed, 0);
    fixture.teardown();
}
