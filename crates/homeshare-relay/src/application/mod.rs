//! Application layer for homeshare-relay.
//!
//! The application layer knows *what* the relay does with each event, but
//! not *how* events arrive or leave.
//!
//! # Responsibilities
//!
//! - Tracking connected devices and their display names ([`registry`])
//! - Storing in-flight transfer sessions ([`sessions`])
//! - The protocol state machine that ties them together ([`relay_engine`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Tokio task spawning or timers (the hub turns [`Effect`]s into I/O)

pub mod registry;
pub mod relay_engine;
pub mod sessions;

pub use registry::DeviceRegistry;
pub use relay_engine::{Effect, RelayEngine};
pub use sessions::SessionStore;
