//! Event types for the client ↔ relay WebSocket protocol.
//!
//! # Frame shape
//!
//! Every frame is a JSON object with the event name under `"event"` and its
//! payload under `"data"`:
//!
//! ```json
//! {"event":"device-info","data":{"type":"mobile-ios","userAgent":"…","timestamp":1700000000000}}
//! {"event":"devices-update","data":[{"id":"…","name":"Amber Falcon", …}]}
//! ```
//!
//! Serde's adjacently tagged representation (`tag = "event", content = "data"`)
//! produces this automatically.  Payload fields are camelCase.
//!
//! # Why two enums?
//!
//! Clients send requests ([`ClientEvent`]); the relay sends notifications
//! ([`RelayEvent`]).  Some names appear in both directions (`transfer-error`),
//! but the payload a client may send is a subset of what the relay may send.
//! Using two distinct enums makes it impossible to, say, forge a
//! `transfer-announced` from a client.
//!
//! # Binary payloads
//!
//! `chunkBytes` is base64 (standard alphabet, padded) so a binary chunk can
//! live inside a JSON string.

use serde::{Deserialize, Serialize};

use crate::domain::device::{Device, DeviceId, DeviceType};
use crate::domain::failure::TransferFailure;
use crate::domain::transfer::{Pin, TransferId};

// ── Client → Relay ────────────────────────────────────────────────────────────

/// Every event a client can send to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// The client reports what kind of device it is.
    ///
    /// Sent once right after connecting.  The relay updates the device's
    /// type and user agent in place and re-broadcasts presence.
    DeviceInfo {
        #[serde(rename = "type")]
        device_type: DeviceType,
        user_agent: String,
        /// Client clock in milliseconds since the Unix epoch (informational).
        #[serde(default)]
        timestamp: u64,
    },

    /// The sender asks the relay to open a transfer session to `target_id`.
    StartTransfer {
        target_id: DeviceId,
        filename: String,
        size: u64,
        total_chunks: u32,
        transfer_id: TransferId,
        /// Sender's own idea of its display name; the relay prefers the name
        /// in its registry.
        #[serde(default)]
        from_name: String,
        #[serde(default)]
        from_type: DeviceType,
        requires_pin: bool,
        #[serde(default)]
        pin: Option<Pin>,
    },

    /// One slice of the file, from the sender.
    Chunk {
        transfer_id: TransferId,
        chunk_index: u32,
        #[serde(with = "base64_bytes")]
        chunk_bytes: Vec<u8>,
        is_last: bool,
    },

    /// The receiver stored chunk `chunk_index`.
    ChunkAck {
        transfer_id: TransferId,
        chunk_index: u32,
    },

    /// The receiver accepts the announced transfer (after the PIN, if any).
    AcceptTransfer { transfer_id: TransferId },

    /// Either peer aborts a transfer (rejection, local failure).
    TransferError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transfer_id: Option<TransferId>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<TransferFailure>,
    },
}

impl ClientEvent {
    /// Short event name for log lines.
    ///
    /// Logging the name instead of the whole event keeps PINs and
    /// megabyte-sized chunk payloads out of the logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::DeviceInfo { .. } => "device-info",
            ClientEvent::StartTransfer { .. } => "start-transfer",
            ClientEvent::Chunk { .. } => "chunk",
            ClientEvent::ChunkAck { .. } => "chunk-ack",
            ClientEvent::AcceptTransfer { .. } => "accept-transfer",
            ClientEvent::TransferError { .. } => "transfer-error",
        }
    }

    /// Builds a `transfer-error` carrying `failure`'s default message.
    pub fn failure(transfer_id: TransferId, failure: TransferFailure) -> Self {
        ClientEvent::TransferError {
            transfer_id: Some(transfer_id),
            message: failure.default_message().to_string(),
            reason: Some(failure),
        }
    }
}

// ── Relay → Client ────────────────────────────────────────────────────────────

/// Every event the relay can send to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RelayEvent {
    /// First event on every connection: the id and name the relay assigned.
    Welcome { id: DeviceId, name: String },

    /// The presence list, excluding the recipient itself.
    DevicesUpdate(Vec<Device>),

    /// A sender wants to give the recipient a file.
    TransferAnnounced {
        transfer_id: TransferId,
        filename: String,
        size: u64,
        from: DeviceId,
        from_name: String,
        #[serde(default)]
        from_type: DeviceType,
        total_chunks: u32,
        requires_pin: bool,
        #[serde(default)]
        pin: Option<Pin>,
    },

    /// The receiver accepted; the sender may start emitting chunks.
    TransferAccepted { transfer_id: TransferId },

    /// A chunk forwarded unchanged from the sender.
    ChunkForward {
        transfer_id: TransferId,
        chunk_index: u32,
        #[serde(with = "base64_bytes")]
        chunk_bytes: Vec<u8>,
        is_last: bool,
    },

    /// Progress for the sender's progress bar.
    Progress {
        transfer_id: TransferId,
        percent: u8,
        status: String,
    },

    /// Every chunk was acknowledged.
    Complete {
        transfer_id: TransferId,
        filename: String,
    },

    /// The transfer (or request) failed.
    TransferError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transfer_id: Option<TransferId>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<TransferFailure>,
    },
}

impl RelayEvent {
    /// Short event name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::Welcome { .. } => "welcome",
            RelayEvent::DevicesUpdate(_) => "devices-update",
            RelayEvent::TransferAnnounced { .. } => "transfer-announced",
            RelayEvent::TransferAccepted { .. } => "transfer-accepted",
            RelayEvent::ChunkForward { .. } => "chunk-forward",
            RelayEvent::Progress { .. } => "progress",
            RelayEvent::Complete { .. } => "complete",
            RelayEvent::TransferError { .. } => "transfer-error",
        }
    }

    /// Builds a `transfer-error` carrying `failure`'s default message.
    pub fn failure(transfer_id: Option<TransferId>, failure: TransferFailure) -> Self {
        RelayEvent::TransferError {
            transfer_id,
            message: failure.default_message().to_string(),
            reason: Some(failure),
        }
    }

    /// The transfer this event concerns, if any.
    pub fn transfer_id(&self) -> Option<&TransferId> {
        match self {
            RelayEvent::Welcome { .. } | RelayEvent::DevicesUpdate(_) => None,
            RelayEvent::TransferAnnounced { transfer_id, .. }
            | RelayEvent::TransferAccepted { transfer_id }
            | RelayEvent::ChunkForward { transfer_id, .. }
            | RelayEvent::Progress { transfer_id, .. }
            | RelayEvent::Complete { transfer_id, .. } => Some(transfer_id),
            RelayEvent::TransferError { transfer_id, .. } => transfer_id.as_ref(),
        }
    }
}

// ── base64 field adapter ──────────────────────────────────────────────────────

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
