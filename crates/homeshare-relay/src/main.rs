//! HomeShare relay: entry point.
//!
//! Every device on the LAN opens one WebSocket to this process.  The relay
//! keeps the presence list, announces transfers to their targets, and forwards
//! file chunks from sender to receiver.
//!
//! # Usage
//!
//! ```text
//! homeshare-relay [OPTIONS]
//!
//! Options:
//!   --config <FILE>              TOML config file (optional)
//!   --bind <IP>                  Listen address [default: 0.0.0.0]
//!   --port <PORT>                Listen port [default: 3000]
//!   --max-file-size <BYTES>      Largest accepted file [default: 20971520]
//!   --grace-secs <SECS>          Completed-session grace delay [default: 5]
//!   --idle-timeout-secs <SECS>   Idle-session timeout, 0 disables [default: 300]
//!   --reap-interval-secs <SECS>  Idle check period [default: 10]
//!   --ping-interval <SECS>       WebSocket ping interval [default: 25]
//!   --ping-timeout <SECS>        Silent-connection timeout [default: 60]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults < config file < environment variables < CLI flags.
//! Environment variables and flags share one clap argument, so only values
//! that were actually given override the file.
//!
//! | Variable                        | Flag                    |
//! |---------------------------------|-------------------------|
//! | `HOMESHARE_CONFIG`              | `--config`              |
//! | `HOMESHARE_BIND`                | `--bind`                |
//! | `HOMESHARE_PORT`                | `--port`                |
//! | `HOMESHARE_MAX_FILE_SIZE`       | `--max-file-size`       |
//! | `HOMESHARE_GRACE_SECS`          | `--grace-secs`          |
//! | `HOMESHARE_IDLE_TIMEOUT_SECS`   | `--idle-timeout-secs`   |
//! | `HOMESHARE_REAP_INTERVAL_SECS`  | `--reap-interval-secs`  |
//! | `HOMESHARE_PING_INTERVAL`       | `--ping-interval`       |
//! | `HOMESHARE_PING_TIMEOUT`        | `--ping-timeout`        |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use homeshare_relay::domain::RelayConfig;
use homeshare_relay::infrastructure::{load_config, run_server, RelayFileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// HomeShare relay.
///
/// Presence tracking and chunked file-transfer relay for devices on the same
/// local network.
#[derive(Debug, Parser)]
#[command(
    name = "homeshare-relay",
    about = "LAN file-transfer relay for HomeShare devices",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "HOMESHARE_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket server to.
    ///
    /// Use `0.0.0.0` to accept connections from the whole LAN, or `127.0.0.1`
    /// to accept only local connections.
    #[arg(long, env = "HOMESHARE_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "HOMESHARE_PORT")]
    port: Option<u16>,

    /// Largest file a transfer may announce, in bytes.
    #[arg(long, env = "HOMESHARE_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Seconds a completed session lingers to absorb trailing acks.
    #[arg(long, env = "HOMESHARE_GRACE_SECS")]
    grace_secs: Option<u64>,

    /// Seconds without events before a session is failed; 0 disables.
    #[arg(long, env = "HOMESHARE_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// Seconds between idle-session checks.
    #[arg(long, env = "HOMESHARE_REAP_INTERVAL_SECS")]
    reap_interval_secs: Option<u64>,

    /// Seconds between WebSocket pings to each device.
    #[arg(long, env = "HOMESHARE_PING_INTERVAL")]
    ping_interval: Option<u64>,

    /// Seconds of silence after which a device is considered gone.
    #[arg(long, env = "HOMESHARE_PING_TIMEOUT")]
    ping_timeout: Option<u64>,
}

impl Cli {
    /// Merges the config file (if any) with the flags that were given.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the bind address is not a valid IP address.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => RelayFileConfig::default(),
        };

        if let Some(bind) = self.bind {
            file.network.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.network.port = port;
        }
        if let Some(secs) = self.ping_interval {
            file.network.ping_interval_secs = secs;
        }
        if let Some(secs) = self.ping_timeout {
            file.network.ping_timeout_secs = secs;
        }
        if let Some(bytes) = self.max_file_size {
            file.transfers.max_file_size = bytes;
        }
        if let Some(secs) = self.grace_secs {
            file.transfers.completion_grace_secs = secs;
        }
        if let Some(secs) = self.idle_timeout_secs {
            file.transfers.idle_timeout_secs = secs;
        }
        if let Some(secs) = self.reap_interval_secs {
            file.transfers.reap_interval_secs = secs;
        }

        file.into_relay_config()
            .context("invalid relay configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` controls the level.
/// 2. CLI arguments (and `HOMESHARE_*` variables) are parsed with `clap`.
/// 3. The config file, if given, is loaded and merged into a [`RelayConfig`].
/// 4. A Ctrl+C handler clears a shared `AtomicBool`.
/// 5. [`run_server`] accepts devices until that flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_relay_config()?;

    info!(
        "HomeShare relay starting: bind={}, max_file_size={} bytes, idle_timeout={}s",
        config.bind_addr,
        config.max_file_size,
        config.session_idle_timeout.as_secs()
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("HomeShare relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["homeshare-relay"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_no_arguments_yields_reference_config() {
        // Arrange
        let cli = Cli {
            config: None,
            bind: None,
            port: None,
            max_file_size: None,
            grace_secs: None,
            idle_timeout_secs: None,
            reap_interval_secs: None,
            ping_interval: None,
            ping_timeout: None,
        };

        // Act
        let config = cli.into_relay_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.max_file_size, 20 * 1024 * 1024);
        assert_eq!(config.completion_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_cli_port_override() {
        let config = cli(&["--port", "9999"]).into_relay_config().unwrap();
        assert_eq!(config.bind_addr.port(), 9999);
    }

    #[test]
    fn test_cli_bind_override() {
        let config = cli(&["--bind", "127.0.0.1"]).into_relay_config().unwrap();
        assert_eq!(config.bind_addr.ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn test_cli_idle_timeout_zero_disables_reaper() {
        let config = cli(&["--idle-timeout-secs", "0"]).into_relay_config().unwrap();
        assert!(!config.reaper_enabled());
    }

    #[test]
    fn test_cli_ping_overrides() {
        let config = cli(&["--ping-interval", "10", "--ping-timeout", "30"])
            .into_relay_config()
            .unwrap();
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.ping_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_cli_invalid_bind_returns_error() {
        let result = cli(&["--bind", "not.an.ip"]).into_relay_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_missing_config_file_returns_error() {
        let result = cli(&["--config", "/nonexistent/homeshare.toml"]).into_relay_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_flag_overrides_config_file() {
        // Arrange
        let path = std::env::temp_dir().join(format!(
            "homeshare-relay-cli-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[network]\nport = 4000\n[transfers]\ncompletion_grace_secs = 9\n")
            .unwrap();
        let path_str = path.to_string_lossy().to_string();

        // Act
        let result = cli(&["--config", &path_str, "--port", "5000"]).into_relay_config();
        let _ = std::fs::remove_file(&path);

        // Assert: the flag wins for port, the file still supplies the grace delay
        let config = result.unwrap();
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.completion_grace, Duration::from_secs(9));
    }
}
