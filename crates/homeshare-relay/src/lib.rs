//! homeshare-relay library crate.
//!
//! The relay is the one process every HomeShare device connects to.  It keeps
//! the presence list, announces transfers to their targets, and forwards file
//! chunks from sender to receiver while tracking each transfer's progress.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Devices (JSON events over WebSocket)
//!         ↕
//! [homeshare-relay]
//!   ├── domain/           Pure types: RelayConfig, TransferSession
//!   ├── application/      Device registry, session store, relay engine
//!   └── infrastructure/
//!         ├── hub/        Actor task that owns the relay engine
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         └── config_file/ TOML configuration file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies (no I/O, no async, no frameworks).
//! - `application` depends on `domain` and `homeshare-core` only.  The relay
//!   engine is a synchronous state machine that returns the events it wants
//!   sent instead of sending them.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # For beginners: why is the engine synchronous?
//!
//! Every rule of the transfer protocol (who may send what, when a transfer is
//! complete, who hears about a failure) lives in one place that can be driven
//! by plain function calls in a unit test.  The async code around it only
//! moves frames between sockets and the engine, so it stays small.

/// Domain layer: pure configuration and session types (no I/O).
pub mod domain;

/// Application layer: presence, session bookkeeping, and the protocol state machine.
pub mod application;

/// Infrastructure layer: hub actor, WebSocket server, and config file loading.
pub mod infrastructure;
