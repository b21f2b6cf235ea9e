//! ---
//! tb_section: "03-test-harness"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Failure types raised to test bodies."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use std::fmt;
use std::panic::Location;

use testbus_msg::MessagingError;

/// Result type returned by test bodies.
pub type TestResult = Result<(), HarnessError>;

/// Raised by a failed assertion to stop the current test body.
///
/// The matching `assert_result` event has already been published by the time
/// the caller sees this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    message: Option<String>,
    location: String,
}

impl AssertionFailure {
    pub(crate) fn new(message: Option<String>, location: &Location<'_>) -> Self {
        Self {
            message,
            location: location.to_string(),
        }
    }

    /// Message given to the assertion, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// `file:line:column` of the failing assertion.
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "assertion failed at {}: {}", self.location, message),
            None => write!(f, "assertion failed at {}", self.location),
        }
    }
}

impl std::error::Error for AssertionFailure {}

/// Errors surfaced by harness operations and test bodies.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// An assertion (including a context affinity check) failed.
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
    /// The harness was used in a way its construction does not allow.
    #[error("illegal use of harness: {0}")]
    IllegalUse(&'static str),
    /// The channel refused a subscription.
    #[error("channel error: {0}")]
    Channel(#[from] MessagingError),
    /// Any other failure raised by a test body.
    #[error(transparent)]
    Body(#[from] anyhow::Error),
}

impl HarnessError {
    /// The assertion failure behind this error, if that is what it is.
    pub fn as_assertion(&self) -> Option<&AssertionFailure> {
        match self {
            HarnessError::Assertion(failure) => Some(failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_message() {
        let location = Location::caller();
        let failure = AssertionFailure::new(Some("boom".into()), location);
        assert_eq!(failure.message(), Some("boom"));
        assert!(failure.to_string().ends_with(": boom"));
        assert!(failure.location().contains("error.rs"));

        let bare = AssertionFailure::new(None, location);
        assert_eq!(bare.to_string(), format!("assertion failed at {}", location));
    }

    #[test]
    fn assertion_errors_convert_and_unwrap() {
        let failure = AssertionFailure::new(None, Location::caller());
        let err: HarnessError = failure.clone().into();
        assert_eq!(err.as_assertion(), Some(&failure));
        let other: HarnessError = anyhow::anyhow!("io broke").into();
        assert!(other.as_assertion().is_none());
    }
}
