//! EventRouter: dispatches relay events to the right part of the client.
//!
//! ```text
//! relay event ──▶ EventRouter
//!                  ├─ welcome / devices-update ──▶ presence (watch channel)
//!                  ├─ transfer-announced / chunk-forward ──▶ ReceiveController
//!                  └─ transfer-accepted / progress / complete / transfer-error
//!                       ├─ outgoing transfer? ──▶ OutgoingSignals
//!                       └─ otherwise ──▶ ReceiveController / observer
//! ```
//!
//! The router lives on the task that reads the connection, so incoming
//! events are handled one at a time in arrival order.

use std::collections::HashSet;
use std::sync::Arc;

use homeshare_core::{Device, DeviceId, RelayEvent};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::incoming::{ReceiveController, ReceiveError};
use crate::application::ports::TransferObserver;
use crate::application::signals::{OutgoingSignals, SenderSignal};
use crate::domain::IncomingOffer;

/// Our identity plus the other devices the relay reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presence {
    /// Id and display name from the `welcome` event.
    pub me: Option<(DeviceId, String)>,
    /// Everyone else, in the relay's order, without duplicates.
    pub devices: Vec<Device>,
}

impl Presence {
    /// Finds a device by exact id or by case-insensitive display name.
    pub fn find(&self, query: &str) -> Option<&Device> {
        let query = query.trim();
        self.devices
            .iter()
            .find(|d| d.id.to_string() == query)
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.name.eq_ignore_ascii_case(query))
            })
    }
}

/// Drops repeated ids (keeping the first) and our own entry.
pub fn dedupe_devices(devices: Vec<Device>, me: Option<DeviceId>) -> Vec<Device> {
    let mut seen = HashSet::new();
    devices
        .into_iter()
        .filter(|d| Some(d.id) != me && seen.insert(d.id))
        .collect()
}

/// Routes relay events for one connection.
pub struct EventRouter {
    receiver: ReceiveController,
    signals: OutgoingSignals,
    observer: Arc<dyn TransferObserver>,
    presence: watch::Sender<Presence>,
}

impl EventRouter {
    pub fn new(
        receiver: ReceiveController,
        signals: OutgoingSignals,
        observer: Arc<dyn TransferObserver>,
    ) -> Self {
        let (presence, _) = watch::channel(Presence::default());
        Self {
            receiver,
            signals,
            observer,
            presence,
        }
    }

    /// A receiver that sees every presence change.
    pub fn subscribe(&self) -> watch::Receiver<Presence> {
        self.presence.subscribe()
    }

    pub fn presence(&self) -> Presence {
        self.presence.borrow().clone()
    }

    /// The receive-side controller, for PIN entry and rejection.
    pub fn receiver_mut(&mut self) -> &mut ReceiveController {
        &mut self.receiver
    }

    pub fn receiver(&self) -> &ReceiveController {
        &self.receiver
    }

    /// Handles one relay event.
    ///
    /// Failures are reported to the observer and logged; they never stop
    /// the router.
    pub async fn handle(&mut self, event: RelayEvent) {
        debug!("relay event: {}", event.name());
        match event {
            RelayEvent::Welcome { id, name } => {
                self.presence.send_modify(|p| {
                    p.devices.retain(|d| d.id != id);
                    p.me = Some((id, name));
                });
            }

            RelayEvent::DevicesUpdate(list) => {
                let me = self.presence.borrow().me.as_ref().map(|(id, _)| *id);
                let devices = dedupe_devices(list, me);
                self.presence.send_modify(|p| p.devices = devices);
            }

            RelayEvent::TransferAnnounced {
                transfer_id,
                filename,
                size,
                from,
                from_name,
                from_type,
                total_chunks,
                requires_pin,
                pin,
            } => {
                if requires_pin && pin.is_none() {
                    warn!("transfer {transfer_id}: PIN required but none announced");
                }
                let offer = IncomingOffer {
                    transfer_id,
                    filename,
                    size,
                    from,
                    from_name,
                    from_type,
                    total_chunks,
                    pin: if requires_pin { pin } else { None },
                };
                if let Err(e) = self.receiver.on_offer(offer).await {
                    self.report(e);
                }
            }

            RelayEvent::ChunkForward {
                transfer_id,
                chunk_index,
                chunk_bytes,
                is_last,
            } => {
                // Reconstruction failures were already reported by the
                // controller; anything else is surfaced here.
                match self
                    .receiver
                    .on_chunk(&transfer_id, chunk_index, chunk_bytes, is_last)
                    .await
                {
                    Ok(_) | Err(ReceiveError::Reconstruction { .. }) => {}
                    Err(e) => self.report(e),
                }
            }

            RelayEvent::TransferAccepted { transfer_id } => {
                if !self.signals.route(&transfer_id, SenderSignal::Accepted) {
                    debug!("transfer {transfer_id}: acceptance for unknown transfer dropped");
                }
            }

            RelayEvent::Progress {
                transfer_id,
                percent,
                status,
            } => {
                let signal = SenderSignal::Progress {
                    percent,
                    status: status.clone(),
                };
                if !self.signals.route(&transfer_id, signal) {
                    self.observer.progress(&transfer_id, percent, &status);
                }
            }

            RelayEvent::Complete {
                transfer_id,
                filename,
            } => {
                if !self.signals.route(&transfer_id, SenderSignal::Complete) {
                    self.observer.completed(&transfer_id, &filename);
                }
            }

            RelayEvent::TransferError {
                transfer_id,
                message,
                reason,
            } => {
                let routed = transfer_id.as_ref().is_some_and(|id| {
                    self.signals.route(
                        id,
                        SenderSignal::Failed {
                            message: message.clone(),
                            reason,
                        },
                    )
                });
                if !routed {
                    self.receiver.on_error(transfer_id.as_ref(), &message);
                }
            }
        }
    }

    fn report(&self, error: ReceiveError) {
        warn!("{error}");
        self.observer.failed(None, &error.to_string());
    }

    /// Ends every transfer after the relay connection is gone.
    pub fn close(&mut self) {
        self.signals.close_all();
        self.receiver.clear();
        self.presence.send_modify(|p| p.devices.clear());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{MemorySink, Observed, RecordingLink, RecordingObserver};
    use homeshare_core::{ClientEvent, DeviceType, Pin, TransferFailure, TransferId};

    struct Fixture {
        link: Arc<RecordingLink>,
        observer: Arc<RecordingObserver>,
        signals: OutgoingSignals,
        router: EventRouter,
    }

    fn fixture() -> Fixture {
        let link = Arc::new(RecordingLink::new());
        let observer = Arc::new(RecordingObserver::default());
        let signals = OutgoingSignals::new();
        let receiver = ReceiveController::new(
            link.clone(),
            Arc::new(MemorySink::default()),
            observer.clone(),
        );
        let router = EventRouter::new(receiver, signals.clone(), observer.clone());
        Fixture {
            link,
            observer,
            signals,
            router,
        }
    }

    fn device(name: &str) -> Device {
        Device {
            id: DeviceId::new_random(),
            name: name.to_string(),
            connected_at: 0,
            device_type: DeviceType::Desktop,
            user_agent: "test".to_string(),
        }
    }

    fn announce(id: &str, requires_pin: bool, pin: Option<&str>) -> RelayEvent {
        RelayEvent::TransferAnnounced {
            transfer_id: TransferId::from(id),
            filename: "f.txt".to_string(),
            size: 4,
            from: DeviceId::new_random(),
            from_name: "Amber Falcon".to_string(),
            from_type: DeviceType::Desktop,
            total_chunks: 1,
            requires_pin,
            pin: pin.map(|p| Pin::parse(p).unwrap()),
        }
    }

    #[test]
    fn test_dedupe_devices_keeps_first_and_drops_self() {
        let me = device("Me");
        let a = device("A");
        let list = vec![a.clone(), me.clone(), a.clone()];

        let deduped = dedupe_devices(list, Some(me.id));

        assert_eq!(deduped, vec![a]);
    }

    #[test]
    fn test_presence_find_by_id_or_name() {
        let a = device("Amber Falcon");
        let presence = Presence {
            me: None,
            devices: vec![a.clone()],
        };

        assert_eq!(presence.find(&a.id.to_string()), Some(&a));
        assert_eq!(presence.find("amber falcon"), Some(&a));
        assert_eq!(presence.find("Nobody"), None);
    }

    #[tokio::test]
    async fn test_welcome_and_update_populate_presence() {
        // Arrange
        let mut f = fixture();
        let me = DeviceId::new_random();
        let other = device("Calm Otter");
        let mut watcher = f.router.subscribe();

        // Act
        f.router
            .handle(RelayEvent::Welcome {
                id: me,
                name: "Bright Fox".to_string(),
            })
            .await;
        f.router
            .handle(RelayEvent::DevicesUpdate(vec![other.clone(), other.clone()]))
            .await;

        // Assert
        assert!(watcher.has_changed().unwrap());
        let presence = watcher.borrow_and_update().clone();
        assert_eq!(presence.me, Some((me, "Bright Fox".to_string())));
        assert_eq!(presence.devices, vec![other]);
    }

    #[tokio::test]
    async fn test_outgoing_events_go_to_signals() {
        let mut f = fixture();
        let id = TransferId::from("out");
        let mut rx = f.signals.register(id.clone());

        f.router
            .handle(RelayEvent::TransferAccepted { transfer_id: id.clone() })
            .await;
        f.router
            .handle(RelayEvent::failure(Some(id.clone()), TransferFailure::PeerDisconnected))
            .await;

        assert_eq!(rx.recv().await, Some(SenderSignal::Accepted));
        assert!(matches!(
            rx.recv().await,
            Some(SenderSignal::Failed { reason: Some(TransferFailure::PeerDisconnected), .. })
        ));
        assert!(f.observer.events().is_empty());
    }

    #[tokio::test]
    async fn test_announcement_without_required_pin_drops_stray_pin_and_auto_accepts() {
        let mut f = fixture();

        f.router.handle(announce("in", false, Some("1234"))).await;

        assert_eq!(
            f.link.sent(),
            vec![ClientEvent::AcceptTransfer { transfer_id: TransferId::from("in") }]
        );
    }

    #[tokio::test]
    async fn test_full_incoming_flow_saves_file_and_reports_completion() {
        // Arrange
        let mut f = fixture();
        let id = TransferId::from("in");

        // Act
        f.router.handle(announce("in", true, Some("4821"))).await;
        f.router
            .receiver_mut()
            .submit_pin(&id, "4821")
            .await
            .unwrap();
        f.router
            .handle(RelayEvent::ChunkForward {
                transfer_id: id.clone(),
                chunk_index: 0,
                chunk_bytes: b"data".to_vec(),
                is_last: true,
            })
            .await;
        f.router
            .handle(RelayEvent::Complete {
                transfer_id: id.clone(),
                filename: "f.txt".to_string(),
            })
            .await;

        // Assert
        let events = f.observer.events();
        assert!(events.iter().any(|e| matches!(e, Observed::Saved(t, _) if *t == id)));
        assert!(events.contains(&Observed::Completed(id.clone(), "f.txt".to_string())));
        assert_eq!(f.router.receiver().pending(), 0);
    }

    #[tokio::test]
    async fn test_error_without_transfer_id_reaches_observer() {
        let mut f = fixture();

        f.router
            .handle(RelayEvent::TransferError {
                transfer_id: None,
                message: "target device disconnected".to_string(),
                reason: Some(TransferFailure::TargetUnavailable),
            })
            .await;

        assert_eq!(
            f.observer.events(),
            vec![Observed::Failed(None, "target device disconnected".to_string())]
        );
    }

    #[tokio::test]
    async fn test_close_fails_waiting_senders_and_buffers() {
        let mut f = fixture();
        let mut rx = f.signals.register(TransferId::from("out"));
        f.router.handle(announce("in", true, Some("4821"))).await;

        f.router.close();

        assert_eq!(rx.recv().await, None);
        assert_eq!(f.router.receiver().pending(), 0);
    }
}
