//! homeshare-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the `homeshare` binary share the same module tree.
//!
//! # What does the client do? (for beginners)
//!
//! Every device that wants to share files opens one WebSocket to the relay.
//! The relay tells it who else is online and passes file chunks between
//! devices; it never stores a file.
//!
//! The client:
//!
//! 1. Connects, reports its device type, and learns its display name.
//! 2. Keeps a de-duplicated list of the other devices.
//! 3. **Sending**: splits a file into chunks, announces it (optionally with
//!    a 4-digit PIN), waits for the receiver to accept, then emits the chunks
//!    in order with a short pause between them.
//! 4. **Receiving**: shows the offer, accepts it (after the PIN when one is
//!    required), stores chunks by index, acknowledges each one, and writes
//!    the reassembled file to the download directory.

/// Domain layer: configuration and the receive buffer.
pub mod domain;

/// Application layer: sender, receiver and event routing.
pub mod application;

/// Infrastructure layer: WebSocket link, filesystem sink, console output.
pub mod infrastructure;
