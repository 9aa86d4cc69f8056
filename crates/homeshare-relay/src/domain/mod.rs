//! Domain layer for homeshare-relay.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or external frameworks.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - Relay-side transfer session state
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod session;

pub use config::RelayConfig;
pub use session::{AckOutcome, SessionState, TransferSession};
