//! ---
//! tb_section: "02-event-protocol"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "JSON encoding of test events."
//! tb_version: "v0.1.0"
//! tb_owner: "tbd"
//! ---
use bytes::Bytes;

use crate::types::{Event, WireEvent};
use crate::Result;

/// Encode an event as a flat JSON object of string fields.
pub fn encode(event: &Event) -> Result<Bytes> {
    let json = serde_json::to_vec(&WireEvent::from(event.clone()))?;
    Ok(Bytes::from(json))
}

/// Decode and validate an event from its JSON payload.
pub fn decode(payload: &[u8]) -> Result<Event> {
    let wire: WireEvent = serde_json::from_slice(payload)?;
    Ok(Event::try_from(wire)?)
}
