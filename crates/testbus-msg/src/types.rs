//! ---
//! tb_section: "02-event-protocol"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Test event vocabulary and its flat wire representation."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::CodecError;

/// Discriminator field present on every event.
pub const TYPE_FIELD: &str = "type";
/// Outcome of an `assert_result` event.
pub const RESULT_FIELD: &str = "result";
/// Free-form text of assert, exception, and trace events.
pub const MESSAGE_FIELD: &str = "message";
/// Rendered stack trace of failed asserts and exceptions.
pub const STACKTRACE_FIELD: &str = "stacktrace";
/// Test name carried by `start_test` and `test_complete`.
pub const NAME_FIELD: &str = "name";

/// Placeholder name carried by every `test_complete` event.
pub const TEST_COMPLETE_PLACEHOLDER: &str = "unused";

/// The closed set of event types exchanged between harness and runner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Outcome of one assertion.
    AssertResult,
    /// The application under test finished starting.
    AppReady,
    /// The application under test stopped.
    AppStopped,
    /// The running test signalled completion.
    TestComplete,
    /// Runner request to start the named test.
    StartTest,
    /// Failure raised outside the assertion flow.
    Exception,
    /// Diagnostic message.
    Trace,
}

/// Outcome reported by an `assert_result` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AssertOutcome {
    /// The asserted condition held.
    Pass,
    /// The asserted condition was false.
    Fail,
}

/// A single test event.
///
/// Construct events through the associated functions so that every variant
/// carries exactly its own field set; `assert_result` in particular has a
/// stack trace if and only if it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
#[allow(missing_docs)]
pub enum Event {
    AssertResult {
        outcome: AssertOutcome,
        message: Option<String>,
        stacktrace: Option<String>,
    },
    AppReady,
    AppStopped,
    /// `name` is always [`TEST_COMPLETE_PLACEHOLDER`] on events built here.
    TestComplete {
        name: String,
    },
    StartTest {
        name: String,
    },
    Exception {
        message: String,
        stacktrace: String,
    },
    Trace {
        message: String,
    },
}

impl Event {
    /// Successful assertion.
    pub fn assert_pass(message: Option<String>) -> Self {
        Event::AssertResult {
            outcome: AssertOutcome::Pass,
            message,
            stacktrace: None,
        }
    }

    /// Failed assertion with the stack trace captured at its call site.
    pub fn assert_fail(message: Option<String>, stacktrace: impl Into<String>) -> Self {
        Event::AssertResult {
            outcome: AssertOutcome::Fail,
            message,
            stacktrace: Some(stacktrace.into()),
        }
    }

    /// Completion of the running test.
    pub fn test_complete() -> Self {
        Event::TestComplete {
            name: TEST_COMPLETE_PLACEHOLDER.to_owned(),
        }
    }

    /// Request to start `name`.
    pub fn start_test(name: impl Into<String>) -> Self {
        Event::StartTest { name: name.into() }
    }

    /// Failure outside the assertion flow.
    pub fn exception(message: impl Into<String>, stacktrace: impl Into<String>) -> Self {
        Event::Exception {
            message: message.into(),
            stacktrace: stacktrace.into(),
        }
    }

    /// Diagnostic message.
    pub fn trace(message: impl Into<String>) -> Self {
        Event::Trace {
            message: message.into(),
        }
    }

    /// Payload-free event of the given kind. Fails for kinds that require fields.
    pub fn bare(kind: EventKind) -> Result<Self, CodecError> {
        match kind {
            EventKind::AppReady => Ok(Event::AppReady),
            EventKind::AppStopped => Ok(Event::AppStopped),
            other => Err(CodecError::MissingPayload(other)),
        }
    }

    /// Discriminator of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::AssertResult { .. } => EventKind::AssertResult,
            Event::AppReady => EventKind::AppReady,
            Event::AppStopped => EventKind::AppStopped,
            Event::TestComplete { .. } => EventKind::TestComplete,
            Event::StartTest { .. } => EventKind::StartTest,
            Event::Exception { .. } => EventKind::Exception,
            Event::Trace { .. } => EventKind::Trace,
        }
    }

    /// True for a `start_test` event naming `test`.
    pub fn starts(&self, test: &str) -> bool {
        matches!(self, Event::StartTest { name } if name == test)
    }
}

/// Flat string-to-string mapping that events travel as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireEvent(BTreeMap<String, String>);

impl WireEvent {
    /// Value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// All fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.0.insert(field.to_owned(), value.into());
        self
    }

    fn with_opt(self, field: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.with(field, value),
            None => self,
        }
    }

    fn take(&mut self, kind: EventKind, field: &'static str) -> Result<String, CodecError> {
        self.0
            .remove(field)
            .ok_or(CodecError::MissingField { kind, field })
    }

    fn finish(self, kind: EventKind) -> Result<(), CodecError> {
        match self.0.into_keys().next() {
            Some(field) => Err(CodecError::UnexpectedField { kind, field }),
            None => Ok(()),
        }
    }
}

impl From<BTreeMap<String, String>> for WireEvent {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let wire = WireEvent::default().with(TYPE_FIELD, event.kind().as_ref());
        match event {
            Event::AssertResult {
                outcome,
                message,
                stacktrace,
            } => wire
                .with(RESULT_FIELD, outcome.as_ref())
                .with_opt(MESSAGE_FIELD, message)
                .with_opt(STACKTRACE_FIELD, stacktrace),
            Event::AppReady | Event::AppStopped => wire,
            Event::TestComplete { name } | Event::StartTest { name } => wire.with(NAME_FIELD, name),
            Event::Exception {
                message,
                stacktrace,
            } => wire
                .with(MESSAGE_FIELD, message)
                .with(STACKTRACE_FIELD, stacktrace),
            Event::Trace { message } => wire.with(MESSAGE_FIELD, message),
        }
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = CodecError;

    fn try_from(mut wire: WireEvent) -> Result<Self, Self::Error> {
        let type_name = wire.0.remove(TYPE_FIELD).ok_or(CodecError::MissingType)?;
        let kind: EventKind = type_name
            .parse()
            .map_err(|_| CodecError::UnknownType(type_name))?;

        let event = match kind {
            EventKind::AssertResult => {
                let raw = wire.take(kind, RESULT_FIELD)?;
                let outcome: AssertOutcome = raw
                    .parse()
                    .map_err(|_| CodecError::InvalidOutcome(raw))?;
                let message = wire.0.remove(MESSAGE_FIELD);
                let stacktrace = wire.0.remove(STACKTRACE_FIELD);
                match (outcome, &stacktrace) {
                    (AssertOutcome::Fail, None) => {
                        return Err(CodecError::MissingField {
                            kind,
                            field: STACKTRACE_FIELD,
                        })
                    }
                    (AssertOutcome::Pass, Some(_)) => {
                        return Err(CodecError::UnexpectedField {
                            kind,
                            field: STACKTRACE_FIELD.to_owned(),
                        })
                    }
                    _ => {}
                }
                Event::AssertResult {
                    outcome,
                    message,
                    stacktrace,
                }
            }
            EventKind::AppReady => Event::AppReady,
            EventKind::AppStopped => Event::AppStopped,
            EventKind::TestComplete => Event::TestComplete {
                name: wire.take(kind, NAME_FIELD)?,
            },
            EventKind::StartTest => Event::StartTest {
                name: wire.take(kind, NAME_FIELD)?,
            },
            EventKind::Exception => Event::Exception {
                message: wire.take(kind, MESSAGE_FIELD)?,
                stacktrace: wire.take(kind, STACKTRACE_FIELD)?,
            },
            EventKind::Trace => Event::Trace {
                message: wire.take(kind, MESSAGE_FIELD)?,
            },
        };
        wire.finish(kind)?;
        Ok(event)
    }
}
