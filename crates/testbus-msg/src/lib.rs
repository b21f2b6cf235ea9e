//! ---
//! tb_section: "02-event-protocol"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Test event vocabulary, wire codec, and channel abstraction."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
//! Wire protocol spoken between test harnesses and the external runner.
#![warn(missing_docs)]

pub mod codec;
pub mod logging;
pub mod transport;
pub mod types;

use types::EventKind;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Schema violations found while building or decoding an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The mapping has no `type` field.
    #[error("event has no type field")]
    MissingType,
    /// The `type` field names no known event.
    #[error("unknown event type '{0}'")]
    UnknownType(String),
    /// The `result` field of an assert event is neither `pass` nor `fail`.
    #[error("invalid assert result '{0}'")]
    InvalidOutcome(String),
    /// A field required by the event kind is absent.
    #[error("{kind} event is missing field '{field}'")]
    MissingField {
        /// Kind being decoded.
        kind: EventKind,
        /// Name of the absent field.
        field: &'static str,
    },
    /// A field not defined for the event kind is present.
    #[error("{kind} event carries unexpected field '{field}'")]
    UnexpectedField {
        /// Kind being decoded.
        kind: EventKind,
        /// Name of the extra field.
        field: String,
    },
    /// A payload-free event was requested for a kind that needs fields.
    #[error("{0} events cannot be sent without a payload")]
    MissingPayload(EventKind),
}

/// Failures raised while encoding, decoding, or moving events.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Wrapper for JSON serialization or deserialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload decoded but does not describe a valid event.
    #[error("schema error: {0}")]
    Schema(#[from] CodecError),
    /// The channel has been closed and accepts no more traffic.
    #[error("channel {0} is closed")]
    Closed(&'static str),
}

pub use codec::{decode, encode};
pub use logging::{log_event, EventDirection};
pub use transport::{
    DeliveryHandler, EventChannel, InMemoryChannel, SubscriptionId, DEFAULT_JOURNAL_CAPACITY,
};
pub use types::{AssertOutcome, Event, WireEvent};
