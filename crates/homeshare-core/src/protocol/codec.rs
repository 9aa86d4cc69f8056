//! Text-frame codec for the event protocol.
//!
//! One event is one WebSocket text frame holding one JSON object.  There is no
//! length prefix or sequence number: WebSocket already frames messages, and
//! the protocol tolerates reordering through chunk indices.

use serde::Serialize;
use thiserror::Error;

use crate::protocol::events::{ClientEvent, RelayEvent};

/// Errors from encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The event could not be serialized.
    #[error("failed to encode {event} event: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The frame is not valid JSON or does not match any known event.
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Events that know their own wire name.
pub trait NamedEvent: Serialize {
    fn event_name(&self) -> &'static str;
}

impl NamedEvent for ClientEvent {
    fn event_name(&self) -> &'static str {
        self.name()
    }
}

impl NamedEvent for RelayEvent {
    fn event_name(&self) -> &'static str {
        self.name()
    }
}

/// Serializes an event into the text of one frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serde rejects the value, which only
/// happens for non-finite floats or non-string map keys; neither occurs in
/// this protocol.
pub fn encode_event<E: NamedEvent>(event: &E) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|source| ProtocolError::Encode {
        event: event.event_name(),
        source,
    })
}

/// Parses a frame sent by a client.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] for bad JSON, unknown event names,
/// missing fields, or invalid field values (e.g. a 3-digit PIN).
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Parses a frame sent by the relay.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] under the same conditions as
/// [`decode_client_event`].
pub fn decode_relay_event(text: &str) -> Result<RelayEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}
