//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default chunk payload size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default ceiling on the size of a file the client will send: 20 MiB.
///
/// Matches the relay's default; a larger file would be rejected with
/// `too-large` anyway.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Runtime configuration for the HomeShare client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket URL of the relay, e.g. `ws://192.168.1.10:3000`.
    pub relay_url: String,
    /// Bytes per chunk when sending.
    pub chunk_size: usize,
    /// Files larger than this are refused before anything is sent.
    pub max_file_size: u64,
    /// Delay between two consecutive chunks of one transfer.
    pub chunk_pacing: Duration,
    /// How long the sender waits for the receiver to accept (and, after the
    /// last chunk, for the relay to report completion).
    pub accept_timeout: Duration,
    /// Directory received files are written to.
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            chunk_pacing: Duration::from_millis(10),
            accept_timeout: Duration::from_secs(120),
            download_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_deployment() {
        let config = ClientConfig::default();

        assert_eq!(config.chunk_size, 1024 * 1024);
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
        assert_eq!(config.chunk_pacing, Duration::from_millis(10));
        assert_eq!(config.accept_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_default_relay_url_is_local_websocket() {
        assert!(ClientConfig::default().relay_url.starts_with("ws://"));
    }
}
