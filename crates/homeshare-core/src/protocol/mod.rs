//! The HomeShare event protocol.
//!
//! Clients and the relay exchange JSON text frames over a WebSocket.  Each
//! frame is one object with a kebab-case `"event"` name and a `"data"`
//! payload whose fields are camelCase:
//!
//! ```json
//! {"event":"chunk-ack","data":{"transferId":"…-1700000000000","chunkIndex":2}}
//! ```
//!
//! - [`events`] defines the two directions as separate enums, so it is a
//!   compile-time error to send a relay-only event from a client.
//! - [`codec`] turns events into text frames and back.

pub mod codec;
pub mod events;
