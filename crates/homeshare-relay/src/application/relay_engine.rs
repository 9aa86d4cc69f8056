//! RelayEngine: the transfer protocol state machine.
//!
//! The engine owns the [`DeviceRegistry`] and the [`SessionStore`] and is the
//! only code that mutates them.  It never touches a socket: every handler
//! returns a list of [`Effect`]s (events to send, removals to schedule) and
//! the hub carries them out.
//!
//! # Protocol rules enforced here
//!
//! - `start-transfer` is validated (size ceiling, non-zero chunk count, PIN
//!   present when required, unique id, registered target) before a session
//!   exists.  A rejected request is answered to the sender only.
//! - Chunks are forwarded only from the session's sender and only after the
//!   receiver accepted.  Acks and acceptance come only from the receiver.
//! - Completion happens when every chunk index was acknowledged once.  The
//!   completed entry lingers for the grace delay and absorbs trailing acks.
//! - Errors, disconnects, and the idle reaper remove a session immediately
//!   and tell the peers why.
//! - Events naming a transfer that does not exist (or that the caller is not
//!   part of) are dropped with a `debug!` line and no reply.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use homeshare_core::{
    percent, ClientEvent, DeviceId, DeviceType, Pin, RelayEvent, TransferFailure, TransferId,
};

use crate::application::registry::DeviceRegistry;
use crate::application::sessions::SessionStore;
use crate::domain::config::RelayConfig;
use crate::domain::session::{AckOutcome, SessionState, TransferSession};

/// Display name used when neither the registry nor the sender supplied one.
const FALLBACK_SENDER_NAME: &str = "Device";

/// Something the engine wants the outside world to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `event` to the connection of device `to`.
    Send { to: DeviceId, event: RelayEvent },
    /// Call [`RelayEngine::expire`] for `transfer_id` once `after` has elapsed.
    ScheduleRemoval {
        transfer_id: TransferId,
        after: Duration,
    },
}

/// Validated contents of a `start-transfer` request.
struct StartRequest {
    target_id: DeviceId,
    filename: String,
    size: u64,
    total_chunks: u32,
    transfer_id: TransferId,
    from_name: String,
    from_type: DeviceType,
    requires_pin: bool,
    pin: Option<Pin>,
}

/// The relay's protocol state machine.
pub struct RelayEngine {
    registry: DeviceRegistry,
    sessions: SessionStore,
    max_file_size: u64,
    completion_grace: Duration,
    session_idle_timeout: Duration,
}

impl RelayEngine {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            sessions: SessionStore::new(),
            max_file_size: config.max_file_size,
            completion_grace: config.completion_grace,
            session_idle_timeout: config.session_idle_timeout,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    // ── Presence ──────────────────────────────────────────────────────────────

    /// A connection opened.
    ///
    /// Registers a provisional desktop device, greets it with its id and
    /// name, and re-broadcasts presence to everyone.
    pub fn connect(&mut self, id: DeviceId, connected_at_ms: u64) -> Vec<Effect> {
        let device = self.registry.register(id, DeviceType::Desktop, connected_at_ms);
        info!(
            "device {} connected as '{}' ({} online)",
            id,
            device.name,
            self.registry.len()
        );

        let mut effects = vec![Effect::Send {
            to: id,
            event: RelayEvent::Welcome {
                id,
                name: device.name,
            },
        }];
        effects.extend(self.broadcast_presence());
        effects
    }

    /// A connection closed.
    ///
    /// Releases the device's name, fails every active session it took part in
    /// (telling the other peer), and re-broadcasts presence.
    pub fn disconnect(&mut self, id: DeviceId) -> Vec<Effect> {
        let Some(device) = self.registry.unregister(id) else {
            return Vec::new();
        };
        info!(
            "device {} ('{}') disconnected ({} online)",
            id,
            device.name,
            self.registry.len()
        );

        let mut effects = Vec::new();
        for transfer_id in self.sessions.active_involving(id) {
            if let Some(session) = self.sessions.remove(&transfer_id) {
                let peer = session.peer_of(id);
                warn!(
                    "transfer {transfer_id} failed: device {id} disconnected mid-transfer"
                );
                effects.push(Effect::Send {
                    to: peer,
                    event: RelayEvent::failure(
                        Some(transfer_id),
                        TransferFailure::PeerDisconnected,
                    ),
                });
            }
        }
        effects.extend(self.broadcast_presence());
        effects
    }

    /// One `devices-update` per connected device, each excluding its recipient.
    fn broadcast_presence(&self) -> Vec<Effect> {
        self.registry
            .ids()
            .map(|to| Effect::Send {
                to,
                event: RelayEvent::DevicesUpdate(self.registry.list(Some(to))),
            })
            .collect()
    }

    // ── Client events ─────────────────────────────────────────────────────────

    /// Handles one event received from device `from` at instant `now`.
    pub fn handle(&mut self, from: DeviceId, event: ClientEvent, now: Instant) -> Vec<Effect> {
        if !self.registry.contains(from) {
            debug!("dropping {} from unregistered device {from}", event.name());
            return Vec::new();
        }

        match event {
            ClientEvent::DeviceInfo {
                device_type,
                user_agent,
                ..
            } => self.on_device_info(from, device_type, &user_agent),

            ClientEvent::StartTransfer {
                target_id,
                filename,
                size,
                total_chunks,
                transfer_id,
                from_name,
                from_type,
                requires_pin,
                pin,
            } => self.on_start_transfer(
                from,
                StartRequest {
                    target_id,
                    filename,
                    size,
                    total_chunks,
                    transfer_id,
                    from_name,
                    from_type,
                    requires_pin,
                    pin,
                },
                now,
            ),

            ClientEvent::AcceptTransfer { transfer_id } => {
                self.on_accept(from, transfer_id, now)
            }

            ClientEvent::Chunk {
                transfer_id,
                chunk_index,
                chunk_bytes,
                is_last,
            } => self.on_chunk(from, transfer_id, chunk_index, chunk_bytes, is_last, now),

            ClientEvent::ChunkAck {
                transfer_id,
                chunk_index,
            } => self.on_chunk_ack(from, transfer_id, chunk_index, now),

            ClientEvent::TransferError {
                transfer_id,
                message,
                reason,
            } => self.on_transfer_error(from, transfer_id, message, reason),
        }
    }

    fn on_device_info(
        &mut self,
        from: DeviceId,
        device_type: DeviceType,
        user_agent: &str,
    ) -> Vec<Effect> {
        self.registry.update_info(from, device_type, user_agent);
        debug!("device {from} reported type {device_type:?}");
        self.broadcast_presence()
    }

    fn on_start_transfer(
        &mut self,
        from: DeviceId,
        request: StartRequest,
        now: Instant,
    ) -> Vec<Effect> {
        let transfer_id = request.transfer_id.clone();
        let reject = |failure: TransferFailure| {
            warn!("rejecting transfer {transfer_id} from {from}: {failure:?}");
            vec![Effect::Send {
                to: from,
                event: RelayEvent::failure(Some(transfer_id.clone()), failure),
            }]
        };

        if request.size > self.max_file_size {
            return reject(TransferFailure::TooLarge);
        }
        // Every chunk carries at least one byte.
        if request.total_chunks == 0
            || u64::from(request.total_chunks) > request.size
            || request.target_id == from
            || (request.requires_pin && request.pin.is_none())
        {
            return reject(TransferFailure::InvalidRequest);
        }
        if self.sessions.contains(&request.transfer_id) {
            return reject(TransferFailure::DuplicateTransfer);
        }
        if !self.registry.contains(request.target_id) {
            return reject(TransferFailure::TargetUnavailable);
        }

        let from_name = self
            .registry
            .get(from)
            .map(|d| d.name.clone())
            .filter(|name| !name.is_empty())
            .or_else(|| Some(request.from_name.clone()).filter(|name| !name.is_empty()))
            .unwrap_or_else(|| FALLBACK_SENDER_NAME.to_string());

        let session = TransferSession::announce(
            request.transfer_id.clone(),
            request.filename.clone(),
            request.size,
            from,
            request.target_id,
            request.total_chunks,
            now,
        );
        if self.sessions.insert(session).is_err() {
            return reject(TransferFailure::DuplicateTransfer);
        }

        info!(
            "transfer {} announced: '{}' ({} bytes, {} chunks) {} -> {}{}",
            request.transfer_id,
            request.filename,
            request.size,
            request.total_chunks,
            from,
            request.target_id,
            if request.requires_pin { ", PIN required" } else { "" }
        );

        vec![
            Effect::Send {
                to: request.target_id,
                event: RelayEvent::TransferAnnounced {
                    transfer_id: request.transfer_id.clone(),
                    filename: request.filename,
                    size: request.size,
                    from,
                    from_name,
                    from_type: request.from_type,
                    total_chunks: request.total_chunks,
                    requires_pin: request.requires_pin,
                    pin: if request.requires_pin { request.pin } else { None },
                },
            },
            Effect::Send {
                to: from,
                event: RelayEvent::Progress {
                    transfer_id: request.transfer_id,
                    percent: 0,
                    status: "Starting...".to_string(),
                },
            },
        ]
    }

    fn on_accept(&mut self, from: DeviceId, transfer_id: TransferId, now: Instant) -> Vec<Effect> {
        let Some(session) = self
            .sessions
            .get_mut(&transfer_id)
            .filter(|s| s.to == from)
        else {
            log_unknown("accept-transfer", &transfer_id, from);
            return Vec::new();
        };

        if !session.accept() {
            debug!("transfer {transfer_id} already accepted; ignoring repeat acceptance");
            return Vec::new();
        }
        session.touch(now);
        info!("transfer {transfer_id} accepted by {from}");

        vec![Effect::Send {
            to: session.from,
            event: RelayEvent::TransferAccepted { transfer_id },
        }]
    }

    fn on_chunk(
        &mut self,
        from: DeviceId,
        transfer_id: TransferId,
        chunk_index: u32,
        chunk_bytes: Vec<u8>,
        is_last: bool,
        now: Instant,
    ) -> Vec<Effect> {
        let Some(session) = self
            .sessions
            .get_mut(&transfer_id)
            .filter(|s| s.from == from)
        else {
            log_unknown("chunk", &transfer_id, from);
            return Vec::new();
        };

        match session.state() {
            SessionState::Announced => {
                debug!(
                    "dropping chunk {chunk_index} of transfer {transfer_id}: receiver has not accepted"
                );
                return Vec::new();
            }
            SessionState::Completed => {
                debug!("dropping chunk {chunk_index} of completed transfer {transfer_id}");
                return Vec::new();
            }
            SessionState::Relaying => {}
        }
        if chunk_index >= session.total_chunks {
            warn!(
                "dropping chunk {chunk_index} of transfer {transfer_id}: only {} chunks announced",
                session.total_chunks
            );
            return Vec::new();
        }

        session.touch(now);
        let sent = percent(chunk_index, session.total_chunks);
        debug!(
            "forwarding chunk {chunk_index}/{} of transfer {transfer_id} ({} bytes)",
            session.total_chunks,
            chunk_bytes.len()
        );

        vec![
            Effect::Send {
                to: session.to,
                event: RelayEvent::ChunkForward {
                    transfer_id: transfer_id.clone(),
                    chunk_index,
                    chunk_bytes,
                    is_last,
                },
            },
            Effect::Send {
                to: from,
                event: RelayEvent::Progress {
                    transfer_id,
                    percent: sent,
                    status: format!("Sending... {sent}%"),
                },
            },
        ]
    }

    fn on_chunk_ack(
        &mut self,
        from: DeviceId,
        transfer_id: TransferId,
        chunk_index: u32,
        now: Instant,
    ) -> Vec<Effect> {
        let Some(session) = self
            .sessions
            .get_mut(&transfer_id)
            .filter(|s| s.to == from)
        else {
            log_unknown("chunk-ack", &transfer_id, from);
            return Vec::new();
        };

        match session.state() {
            SessionState::Completed => {
                debug!("absorbing trailing ack {chunk_index} for completed transfer {transfer_id}");
                return Vec::new();
            }
            SessionState::Announced => {
                debug!("ignoring ack {chunk_index} for unaccepted transfer {transfer_id}");
                return Vec::new();
            }
            SessionState::Relaying => {}
        }

        session.touch(now);
        let acked = match session.record_ack(chunk_index) {
            AckOutcome::Counted { acked } => acked,
            AckOutcome::Duplicate => {
                debug!("duplicate ack {chunk_index} for transfer {transfer_id}");
                return Vec::new();
            }
            AckOutcome::OutOfRange => {
                warn!("out-of-range ack {chunk_index} for transfer {transfer_id}");
                return Vec::new();
            }
        };

        let received = percent(acked, session.total_chunks);
        let mut effects = vec![Effect::Send {
            to: session.from,
            event: RelayEvent::Progress {
                transfer_id: transfer_id.clone(),
                percent: received,
                status: format!("Receiving... {received}%"),
            },
        }];

        if session.state() == SessionState::Completed {
            info!(
                "transfer {transfer_id} completed: '{}' ({} bytes)",
                session.filename, session.size
            );
            let complete = RelayEvent::Complete {
                transfer_id: transfer_id.clone(),
                filename: session.filename.clone(),
            };
            effects.push(Effect::Send {
                to: session.from,
                event: complete.clone(),
            });
            effects.push(Effect::Send {
                to: session.to,
                event: complete,
            });
            effects.push(Effect::ScheduleRemoval {
                transfer_id,
                after: self.completion_grace,
            });
        }
        effects
    }

    fn on_transfer_error(
        &mut self,
        from: DeviceId,
        transfer_id: Option<TransferId>,
        message: String,
        reason: Option<TransferFailure>,
    ) -> Vec<Effect> {
        let Some(transfer_id) = transfer_id else {
            debug!("transfer-error from {from} without a transfer id: {message}");
            return Vec::new();
        };
        let is_live_participant = self
            .sessions
            .get(&transfer_id)
            .is_some_and(|s| s.is_active() && s.involves(from));
        if !is_live_participant {
            log_unknown("transfer-error", &transfer_id, from);
            return Vec::new();
        }
        let Some(session) = self.sessions.remove(&transfer_id) else {
            return Vec::new();
        };

        warn!("transfer {transfer_id} aborted by {from}: {message}");
        let event = RelayEvent::TransferError {
            transfer_id: Some(transfer_id),
            message,
            reason,
        };
        vec![
            Effect::Send {
                to: session.from,
                event: event.clone(),
            },
            Effect::Send {
                to: session.to,
                event,
            },
        ]
    }

    // ── Timers ────────────────────────────────────────────────────────────────

    /// The grace delay of a completed session elapsed.
    ///
    /// Removes the session if it is still `Completed`; returns whether it did.
    pub fn expire(&mut self, transfer_id: &TransferId) -> bool {
        let completed = self
            .sessions
            .get(transfer_id)
            .is_some_and(|s| s.state() == SessionState::Completed);
        if completed {
            self.sessions.remove(transfer_id);
            debug!("completed transfer {transfer_id} removed after grace delay");
        }
        completed
    }

    /// Fails every active session idle for longer than the idle timeout.
    ///
    /// Does nothing when the timeout is zero.
    pub fn reap_idle(&mut self, now: Instant) -> Vec<Effect> {
        if self.session_idle_timeout.is_zero() {
            return Vec::new();
        }

        let mut effects = Vec::new();
        for transfer_id in self.sessions.idle(now, self.session_idle_timeout) {
            let Some(session) = self.sessions.remove(&transfer_id) else {
                continue;
            };
            warn!(
                "transfer {transfer_id} reaped after {}s without events",
                session.idle_for(now).as_secs()
            );
            let event = RelayEvent::failure(Some(transfer_id), TransferFailure::IdleTimeout);
            effects.push(Effect::Send {
                to: session.from,
                event: event.clone(),
            });
            effects.push(Effect::Send {
                to: session.to,
                event,
            });
        }
        effects
    }

    /// Forgets every device and session.  Called once when the relay stops.
    pub fn shutdown(&mut self) {
        info!(
            "relay engine shutting down ({} devices, {} sessions)",
            self.registry.len(),
            self.sessions.len()
        );
        self.sessions.clear();
        self.registry.clear();
    }
}

/// Logs an event that names no session the caller belongs to.
///
/// These are expected races (trailing events after cleanup), not errors.
fn log_unknown(event: &str, transfer_id: &TransferId, from: DeviceId) {
    debug!("dropping {event} for unknown transfer {transfer_id} from {from}");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
