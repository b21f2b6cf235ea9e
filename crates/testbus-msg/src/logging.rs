//! ---
//! tb_section: "02-event-protocol"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Structured logging for event traffic."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use tracing::debug;

use crate::types::Event;

/// Direction of the event movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDirection {
    /// Event published by this process.
    Outbound,
    /// Event received from the channel.
    Inbound,
}

/// Emit a structured log entry for event activity.
pub fn log_event(direction: EventDirection, address: &str, event: &Event) {
    debug!(
        address,
        kind = event.kind().as_ref(),
        direction = ?direction,
        "event activity"
    );
}
