//! Infrastructure layer for homeshare-relay.
//!
//! The infrastructure layer handles all I/O and all tasks.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Running the hub task that owns the relay engine
//! - Spawning per-connection reader/writer tasks and keep-alive pings
//! - Loading the optional TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Protocol rules (that is the application layer's relay engine)
//! - Event type definitions (those live in `homeshare-core`)

pub mod config_file;
pub mod hub;
pub mod ws_server;

pub use config_file::{load_config, ConfigError, RelayFileConfig};
pub use hub::{spawn_hub, HubCommand, HubHandle};
pub use ws_server::{run_server, serve};
