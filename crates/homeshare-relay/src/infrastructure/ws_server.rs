//! WebSocket server: accept loop and per-connection task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from devices.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Registering the connection with the hub under a fresh [`DeviceId`].
//! 5. Running two concurrent tasks per connection:
//!    - **Reader**: decodes JSON text frames into [`ClientEvent`]s and hands
//!      them to the hub.  Closes the connection if nothing arrives within the
//!      ping timeout.
//!    - **Writer**: encodes the hub's [`RelayEvent`]s into text frames and
//!      sends a WebSocket Ping every ping interval.
//! 6. Telling the hub when the connection is gone, whichever side ended it.
//! 7. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Keep-alive (for beginners)
//!
//! A phone that walks out of Wi-Fi range does not close its TCP connection;
//! it just goes silent.  The writer's periodic Ping makes a live peer answer
//! with a Pong, so "no frame at all for `ping_timeout`" reliably means the
//! peer is gone and its transfers can be failed.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use homeshare_core::{decode_client_event, encode_event, DeviceId, RelayEvent};

use crate::domain::config::RelayConfig;
use crate::infrastructure::hub::{spawn_hub, HubCommand, HubHandle};

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr` and serves until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!("HomeShare relay listening on ws://{}", config.bind_addr);

    serve(listener, config, running).await
}

/// Runs the relay on an already-bound listener.
///
/// Starts the hub, then accepts connections in a loop.  Each accepted
/// connection is handed off to a dedicated Tokio task so that one slow device
/// never blocks others.  Tests bind `127.0.0.1:0` themselves and call this
/// directly so they know the port.
///
/// # Errors
///
/// Currently always returns `Ok`; accept errors are logged and the loop
/// continues.
pub async fn serve(
    listener: TcpListener,
    config: RelayConfig,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let (hub, hub_task) = spawn_hub(&config);
    let config = Arc::new(config);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the `running` flag even when
        // no device is connecting.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new TCP connection from {peer_addr}");
                let cfg = Arc::clone(&config);
                let hub = hub.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, cfg, hub).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout: loop back to check the `running` flag.
            }
        }
    }

    // Live connections hold hub handles; the hub clears its state and stops
    // once the last of them closes.
    drop(hub);
    drop(hub_task);
    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Wraps [`run_connection`] and logs the outcome.
async fn handle_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<RelayConfig>,
    hub: HubHandle,
) {
    match run_connection(raw_stream, peer_addr, config, hub).await {
        Ok(()) => debug!("connection {peer_addr} closed normally"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one device connection.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    config: Arc<RelayConfig>,
    hub: HubHandle,
) -> anyhow::Result<()> {
    // ── Step 1: Complete the WebSocket handshake ──────────────────────────────
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // ── Step 2: Register with the hub ─────────────────────────────────────────
    let id = DeviceId::new_random();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<RelayEvent>();
    if !hub
        .send(HubCommand::Connect {
            id,
            outbound: outbound_tx,
        })
        .await
    {
        anyhow::bail!("relay hub is not running");
    }
    info!("device {id} connected from {peer_addr}");

    // ── Step 3: Reader and writer tasks ───────────────────────────────────────
    let (ws_tx, ws_rx) = ws_stream.split();

    let writer_task = tokio::spawn(write_frames(ws_tx, outbound_rx, id, config.ping_interval));
    let reader_task = tokio::spawn(read_frames(ws_rx, hub.clone(), id, config.ping_timeout));

    // ── Step 4: Wait for either task to finish ────────────────────────────────
    //
    // Dropping a JoinHandle does not stop its task, so the survivor is
    // aborted explicitly.
    let mut writer_task = writer_task;
    let mut reader_task = reader_task;
    tokio::select! {
        _ = &mut reader_task => {
            debug!("device {id}: reader task ended");
            writer_task.abort();
        }
        _ = &mut writer_task => {
            debug!("device {id}: writer task ended");
            reader_task.abort();
        }
    }

    hub.send(HubCommand::Disconnect { id }).await;
    info!("device {id} disconnected ({peer_addr})");
    Ok(())
}

/// Reads frames from the device until it closes or goes silent.
async fn read_frames(mut ws_rx: WsSource, hub: HubHandle, id: DeviceId, ping_timeout: Duration) {
    loop {
        let ws_msg = match timeout(ping_timeout, ws_rx.next()).await {
            Err(_) => {
                warn!("device {id}: no frames for {}s; closing", ping_timeout.as_secs());
                break;
            }
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(WsError::ConnectionClosed | WsError::Protocol(_)))) => {
                debug!("device {id}: WebSocket closed");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!("device {id}: WebSocket error: {e}");
                break;
            }
            Ok(None) => {
                debug!("device {id}: stream ended");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(text) => match decode_client_event(&text) {
                Ok(event) => {
                    if !hub.send(HubCommand::Event { from: id, event }).await {
                        break;
                    }
                }
                Err(e) => {
                    // One bad frame does not end the connection.
                    warn!("device {id}: {e}");
                }
            },
            WsMessage::Binary(_) => {
                warn!("device {id}: unexpected binary WebSocket frame (ignored)");
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {
                // tungstenite queues the Pong reply itself; the frame only
                // proves the peer is alive.
            }
            WsMessage::Close(_) => {
                debug!("device {id}: Close frame received");
                break;
            }
            WsMessage::Frame(_) => {}
        }
    }
}

/// Writes hub events to the device and keeps the connection alive.
async fn write_frames(
    mut ws_tx: WsSink,
    mut outbound: mpsc::UnboundedReceiver<RelayEvent>,
    id: DeviceId,
    ping_interval: Duration,
) {
    let mut ticker = interval(ping_interval.max(Duration::from_millis(100)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick resolves immediately.
    ticker.tick().await;

    loop {
        let frame = tokio::select! {
            event = outbound.recv() => match event {
                Some(event) => match encode_event(&event) {
                    Ok(text) => WsMessage::Text(text),
                    Err(e) => {
                        error!("device {id}: {e}");
                        continue;
                    }
                },
                // The hub dropped this connection.
                None => break,
            },
            _ = ticker.tick() => WsMessage::Ping(Vec::new()),
        };

        if let Err(e) = ws_tx.send(frame).await {
            debug!("device {id}: WebSocket send failed: {e}");
            break;
        }
    }

    let _ = ws_tx.close().await;
}
