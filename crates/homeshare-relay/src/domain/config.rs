//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from the config file and CLI flags (see
//! `main.rs`), or from [`RelayConfig::default`] in tests.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the relay easy to embed in tests.

use std::net::SocketAddr;
use std::time::Duration;

/// 20 MiB, the reference deployment's file size ceiling.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use homeshare_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The address and port the WebSocket server binds to.
    ///
    /// `0.0.0.0` accepts connections from the whole LAN, which is the point
    /// of the relay.  `127.0.0.1` restricts it to the local machine.
    pub bind_addr: SocketAddr,

    /// Largest `size` a `start-transfer` may announce, in bytes.
    pub max_file_size: u64,

    /// How long a completed session lingers so trailing duplicate
    /// acknowledgements still find it.
    pub completion_grace: Duration,

    /// A session with no events for this long is reaped with an
    /// `idle-timeout` error.  [`Duration::ZERO`] disables reaping.
    pub session_idle_timeout: Duration,

    /// How often the hub looks for idle sessions.
    pub reap_interval: Duration,

    /// How often the relay sends a WebSocket Ping to each connection.
    pub ping_interval: Duration,

    /// A connection that sends nothing (not even a Pong) for this long is
    /// considered dead and closed.
    pub ping_timeout: Duration,

    /// Capacity of the bounded command channel into the hub.
    pub command_capacity: usize,
}

impl Default for RelayConfig {
    /// | Field                | Default        |
    /// |----------------------|----------------|
    /// | bind_addr            | `0.0.0.0:3000` |
    /// | max_file_size        | 20 MiB         |
    /// | completion_grace     | 5 seconds      |
    /// | session_idle_timeout | 300 seconds    |
    /// | reap_interval        | 10 seconds     |
    /// | ping_interval        | 25 seconds     |
    /// | ping_timeout         | 60 seconds     |
    /// | command_capacity     | 1024           |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            completion_grace: Duration::from_secs(5),
            session_idle_timeout: Duration::from_secs(300),
            reap_interval: Duration::from_secs(10),
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(60),
            command_capacity: 1024,
        }
    }
}

impl RelayConfig {
    /// Returns `true` when the idle-session reaper is enabled.
    pub fn reaper_enabled(&self) -> bool {
        !self.session_idle_timeout.is_zero()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
