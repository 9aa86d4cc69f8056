//! Why a transfer ended without completing.
//!
//! Every failure is terminal for the transfer it names: nothing is retried or
//! resumed, and a new attempt needs a fresh transfer id.  The variant travels
//! in the `reason` field of a `transfer-error` event so peers can react to the
//! cause without parsing the message text.

use serde::{Deserialize, Serialize};

/// Machine-readable cause attached to a `transfer-error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferFailure {
    /// `start-transfer` named a device that is not connected.
    TargetUnavailable,
    /// An event referenced a transfer id with no session.
    ///
    /// The relay never sends this; trailing events after cleanup are expected
    /// and dropped silently.  Clients use it locally.
    UnknownTransfer,
    /// The other participant disconnected mid-transfer.
    PeerDisconnected,
    /// The receiving user declined the file or cancelled the PIN prompt.
    UserRejected,
    /// The receiver could not reassemble or store the file.
    ReconstructionFailure,
    /// The announced size exceeds the relay's ceiling.
    TooLarge,
    /// A session with the same transfer id already exists.
    DuplicateTransfer,
    /// The session saw no events for longer than the idle timeout.
    IdleTimeout,
    /// The request was structurally invalid (e.g. zero chunks).
    InvalidRequest,
}

impl TransferFailure {
    /// Default user-facing text for this failure.
    pub fn default_message(self) -> &'static str {
        match self {
            TransferFailure::TargetUnavailable => "target device disconnected",
            TransferFailure::UnknownTransfer => "transfer not found",
            TransferFailure::PeerDisconnected => "device disconnected during transfer",
            TransferFailure::UserRejected => "rejected by the user",
            TransferFailure::ReconstructionFailure => "error processing file",
            TransferFailure::TooLarge => "file too large",
            TransferFailure::DuplicateTransfer => "transfer already in progress",
            TransferFailure::IdleTimeout => "transfer timed out",
            TransferFailure::InvalidRequest => "invalid transfer request",
        }
    }
}
