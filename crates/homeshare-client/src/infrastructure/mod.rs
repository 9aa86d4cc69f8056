//! Infrastructure layer: relay WebSocket, download directory, terminal output.

pub mod console;
pub mod file_sink;
pub mod relay_conn;

pub use console::ConsoleObserver;
pub use file_sink::DownloadDir;
pub use relay_conn::{connect, device_info, RelayConnection, WsRelayLink};
