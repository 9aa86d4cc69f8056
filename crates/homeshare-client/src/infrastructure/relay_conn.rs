//! WebSocket connection from the client to the relay.
//!
//! [`connect`] performs the handshake, splits the socket and starts two
//! tasks:
//!
//! - **Writer**: takes encoded frames from [`WsRelayLink`] and writes them.
//! - **Reader**: decodes text frames into [`RelayEvent`]s and pushes them on
//!   the `events` channel.
//!
//! When the relay goes away the reader ends and drops its sender, so
//! `events.recv()` returns `None`.  The writer ends on its next failed write
//! (or once every link handle is dropped), after which
//! [`RelayLink::send`] returns [`LinkError::Closed`].

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use homeshare_core::{decode_relay_event, encode_event, ClientEvent, DeviceType, RelayEvent};

use crate::application::ports::{LinkError, RelayLink};

/// Outbound handle: encodes events and queues them for the writer task.
#[derive(Debug, Clone)]
pub struct WsRelayLink {
    frames: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl RelayLink for WsRelayLink {
    async fn send(&self, event: ClientEvent) -> Result<(), LinkError> {
        let text = encode_event(&event)?;
        self.frames.send(text).map_err(|_| LinkError::Closed)
    }
}

/// An open connection to the relay.
pub struct RelayConnection {
    pub link: WsRelayLink,
    pub events: mpsc::UnboundedReceiver<RelayEvent>,
}

/// Connects to `url` and starts the reader and writer tasks.
///
/// # Errors
///
/// Returns an error if the TCP connection or the WebSocket handshake fails.
pub async fn connect(url: &str) -> anyhow::Result<RelayConnection> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to relay at {url}"))?;
    info!("connected to relay at {url}");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<String>();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<RelayEvent>();

    // ── Writer ────────────────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(text) = frames_rx.recv().await {
            if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                debug!("relay write failed: {e}");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // ── Reader ────────────────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match decode_relay_event(&text) {
                    Ok(event) => {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("relay sent {e}"),
                },
                Ok(WsMessage::Close(_)) => {
                    debug!("relay closed the connection");
                    break;
                }
                // tungstenite answers pings itself.
                Ok(_) => {}
                Err(e) => {
                    warn!("relay connection error: {e}");
                    break;
                }
            }
        }
        info!("relay connection closed");
    });

    Ok(RelayConnection {
        link: WsRelayLink { frames: frames_tx },
        events: events_rx,
    })
}

/// The `device-info` event this client sends right after connecting.
pub fn device_info() -> ClientEvent {
    ClientEvent::DeviceInfo {
        device_type: DeviceType::for_host(),
        user_agent: user_agent(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0),
    }
}

/// User agent string reported to the relay, e.g. `homeshare-cli/0.1.0 (linux)`.
pub fn user_agent() -> String {
    format!(
        "homeshare-cli/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_client_and_os() {
        let ua = user_agent();
        assert!(ua.starts_with("homeshare-cli/"));
        assert!(ua.contains(std::env::consts::OS));
    }

    #[test]
    fn test_device_info_reports_host_type() {
        let ClientEvent::DeviceInfo { device_type, .. } = device_info() else {
            panic!("expected device-info");
        };
        assert_eq!(device_type, DeviceType::for_host());
    }

    #[tokio::test]
    async fn test_link_send_fails_once_writer_is_gone() {
        // Arrange
        let (frames, rx) = mpsc::unbounded_channel();
        let link = WsRelayLink { frames };
        drop(rx);

        // Act
        let result = link
            .send(ClientEvent::AcceptTransfer {
                transfer_id: "t".into(),
            })
            .await;

        // Assert
        assert!(matches!(result, Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let result = connect("ws://127.0.0.1:1").await;
        assert!(result.is_err());
    }
}
