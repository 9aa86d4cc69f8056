//! HomeShare command-line client.
//!
//! # Usage
//!
//! ```text
//! homeshare [--relay <URL>] devices [--wait-secs <SECS>]
//! homeshare [--relay <URL>] send <FILE> --to <NAME|ID> [--pin] [OPTIONS]
//! homeshare [--relay <URL>] receive [--download-dir <DIR>]
//! ```
//!
//! `--relay` defaults to `ws://127.0.0.1:3000` and can also be set with
//! `HOMESHARE_RELAY`.  Logs go to stderr; `RUST_LOG` controls the level.
//!
//! # Receiving with a PIN
//!
//! When an offer needs a PIN the client prints a prompt.  Type the digits
//! the sender shows (spaces and dashes are ignored) and press Enter, or type
//! `n` to decline.  A wrong PIN can be retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::EnvFilter;

use homeshare_client::application::{
    EventRouter, LocalDevice, OutgoingSignals, Presence, ReceiveController, ReceiveError,
    RelayLink, SendFileUseCase, TransferObserver,
};
use homeshare_client::domain::config::{ClientConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE};
use homeshare_client::infrastructure::console::describe_device;
use homeshare_client::infrastructure::{
    connect, device_info, ConsoleObserver, DownloadDir, RelayConnection, WsRelayLink,
};
use homeshare_core::{format_size, DeviceType, RelayEvent};

/// How long `send` waits for the relay to list the target device.
const TARGET_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "homeshare",
    about = "Share files with devices on your local network",
    version
)]
struct Cli {
    /// WebSocket URL of the relay.
    #[arg(
        long,
        global = true,
        env = "HOMESHARE_RELAY",
        default_value = "ws://127.0.0.1:3000"
    )]
    relay: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the devices currently connected to the relay.
    Devices {
        /// Seconds to listen for presence updates before printing.
        #[arg(long, default_value_t = 1)]
        wait_secs: u64,
    },

    /// Send a file to another device.
    Send {
        /// File to send.
        file: PathBuf,

        /// Target device: display name (case-insensitive) or id.
        #[arg(long)]
        to: String,

        /// Protect the transfer with a 4-digit PIN the receiver must type.
        #[arg(long)]
        pin: bool,

        /// Bytes per chunk.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Largest file the client will send, in bytes.
        #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
        max_file_size: u64,

        /// Milliseconds between chunks.
        #[arg(long, default_value_t = 10)]
        pacing_ms: u64,

        /// Seconds to wait for the receiver to accept.
        #[arg(long, default_value_t = 120)]
        accept_timeout_secs: u64,
    },

    /// Wait for incoming files and save them.
    Receive {
        /// Directory received files are written to.
        #[arg(long, env = "HOMESHARE_DOWNLOAD_DIR", default_value = ".")]
        download_dir: PathBuf,
    },
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            relay_url: self.relay.clone(),
            ..ClientConfig::default()
        };
        match &self.command {
            Command::Devices { .. } => {}
            Command::Send {
                chunk_size,
                max_file_size,
                pacing_ms,
                accept_timeout_secs,
                ..
            } => {
                config.chunk_size = *chunk_size;
                config.max_file_size = *max_file_size;
                config.chunk_pacing = Duration::from_millis(*pacing_ms);
                config.accept_timeout = Duration::from_secs(*accept_timeout_secs);
            }
            Command::Receive { download_dir } => {
                config.download_dir = download_dir.clone();
            }
        }
        config
    }
}

// ── Session wiring ────────────────────────────────────────────────────────────

/// A connected relay session with its router.
struct Session {
    link: Arc<WsRelayLink>,
    signals: OutgoingSignals,
    router: EventRouter,
    events: mpsc::UnboundedReceiver<RelayEvent>,
}

async fn open_session(
    config: &ClientConfig,
    observer: Arc<dyn TransferObserver>,
) -> anyhow::Result<Session> {
    let RelayConnection { link, events } = connect(&config.relay_url).await?;
    let link = Arc::new(link);
    link.send(device_info())
        .await
        .context("failed to report device info")?;

    let signals = OutgoingSignals::new();
    let receiver = ReceiveController::new(
        link.clone(),
        Arc::new(DownloadDir::new(&config.download_dir)),
        observer.clone(),
    );
    let router = EventRouter::new(receiver, signals.clone(), observer);
    Ok(Session {
        link,
        signals,
        router,
        events,
    })
}

/// Moves the router onto its own task; returns the presence feed.
fn spawn_router(
    mut router: EventRouter,
    mut events: mpsc::UnboundedReceiver<RelayEvent>,
) -> watch::Receiver<Presence> {
    let presence = router.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            router.handle(event).await;
        }
        router.close();
    });
    presence
}

async fn wait_for_welcome(presence: &mut watch::Receiver<Presence>) -> anyhow::Result<()> {
    timeout(
        TARGET_LOOKUP_TIMEOUT,
        presence.wait_for(|p| p.me.is_some()),
    )
    .await
    .context("relay did not welcome this device")?
    .context("relay connection closed")?;
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_devices(config: &ClientConfig, wait: Duration) -> anyhow::Result<()> {
    let session = open_session(config, Arc::new(ConsoleObserver)).await?;
    let mut presence = spawn_router(session.router, session.events);
    wait_for_welcome(&mut presence).await?;
    tokio::time::sleep(wait).await;

    let snapshot = presence.borrow().clone();
    if let Some((_, name)) = &snapshot.me {
        println!("This device: {name}");
    }
    if snapshot.devices.is_empty() {
        println!("No other devices connected.");
    }
    for device in &snapshot.devices {
        println!("{}", describe_device(device));
    }
    Ok(())
}

async fn run_send(config: &ClientConfig, file: &Path, to: &str, use_pin: bool) -> anyhow::Result<()> {
    // The size check comes before the file is read into memory.
    let size = tokio::fs::metadata(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?
        .len();
    if size > config.max_file_size {
        bail!(
            "{} is {}; the limit is {}",
            file.display(),
            format_size(size),
            format_size(config.max_file_size)
        );
    }
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let observer: Arc<dyn TransferObserver> = Arc::new(ConsoleObserver);
    let session = open_session(config, observer.clone()).await?;
    let (link, signals) = (session.link, session.signals);
    let mut presence = spawn_router(session.router, session.events);

    let snapshot = timeout(
        TARGET_LOOKUP_TIMEOUT,
        presence.wait_for(|p| p.me.is_some() && p.find(to).is_some()),
    )
    .await
    .with_context(|| format!("device '{to}' is not connected to the relay"))?
    .context("relay connection closed")?
    .clone();
    let (Some((my_id, my_name)), Some(target)) = (snapshot.me.clone(), snapshot.find(to)) else {
        bail!("device '{to}' is not connected to the relay");
    };

    let me = LocalDevice {
        id: my_id,
        name: my_name,
        device_type: DeviceType::for_host(),
    };
    let use_case = SendFileUseCase::new(link, signals, observer, config);
    let prepared = use_case.prepare(&me, target.id, filename, data, use_pin)?;

    println!(
        "Sending {} ({}) to {}",
        prepared.filename,
        format_size(prepared.size()),
        target.name
    );
    if let Some(pin) = &prepared.pin {
        println!("PIN: {pin}  (the receiver must type this)");
    }

    let filename = prepared.filename.clone();
    use_case.run(prepared).await?;
    println!("Sent {filename}");
    Ok(())
}

async fn run_receive(config: &ClientConfig) -> anyhow::Result<()> {
    let session = open_session(config, Arc::new(ConsoleObserver)).await?;
    let mut router = session.router;
    let mut events = session.events;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut introduced = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    router.close();
                    bail!("relay connection closed");
                };
                router.handle(event).await;
                if !introduced {
                    if let Some((_, name)) = &router.presence().me {
                        println!(
                            "Receiving as {name}; saving to {}",
                            config.download_dir.display()
                        );
                        introduced = true;
                    }
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => answer_pin_prompt(&mut router, &line).await,
                    _ => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C; stopping");
                return Ok(());
            }
        }
    }
}

/// Applies one line of user input to the oldest offer waiting for a PIN.
async fn answer_pin_prompt(router: &mut EventRouter, line: &str) {
    let Some(offer) = router.receiver().awaiting_pin().first().map(|o| (*o).clone()) else {
        return;
    };
    let id = offer.transfer_id;
    let answer = line.trim();

    if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
        match router.receiver_mut().reject(&id).await {
            Ok(()) => println!("Declined {}", offer.filename),
            Err(e) => println!("Could not decline: {e}"),
        }
        return;
    }

    match router.receiver_mut().submit_pin(&id, answer).await {
        Ok(()) => println!("PIN accepted; receiving {}", offer.filename),
        Err(ReceiveError::Pin(e)) => println!("{e}. Try again (or 'n' to decline):"),
        Err(e) => println!("Could not accept: {e}"),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();

    match &cli.command {
        Command::Devices { wait_secs } => {
            run_devices(&config, Duration::from_secs(*wait_secs)).await
        }
        Command::Send { file, to, pin, .. } => run_send(&config, file, to, *pin).await,
        Command::Receive { .. } => run_receive(&config).await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
