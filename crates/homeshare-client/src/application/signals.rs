//! Per-transfer signal channels for outgoing transfers.
//!
//! The event router runs on the connection's reader side and the sending use
//! case runs in its own task.  Each outgoing transfer registers a channel
//! here under its [`TransferId`]; the router pushes every relay event about
//! that transfer into it.  Dropping the board's senders (on disconnect) ends
//! every waiting transfer with a closed channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use homeshare_core::{TransferFailure, TransferId};
use tokio::sync::mpsc;

/// A relay event about one outgoing transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum SenderSignal {
    /// The receiver accepted; chunks may flow.
    Accepted,
    /// Relay-computed progress.
    Progress { percent: u8, status: String },
    /// Every chunk was acknowledged.
    Complete,
    /// The relay or the receiver ended the transfer.
    Failed {
        message: String,
        reason: Option<TransferFailure>,
    },
}

type Channels = HashMap<TransferId, mpsc::UnboundedSender<SenderSignal>>;

/// Shared map from transfer id to its signal channel.
#[derive(Debug, Clone, Default)]
pub struct OutgoingSignals {
    inner: Arc<Mutex<Channels>>,
}

impl OutgoingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> std::sync::MutexGuard<'_, Channels> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the channel for `transfer_id`, replacing any previous one.
    pub fn register(&self, transfer_id: TransferId) -> mpsc::UnboundedReceiver<SenderSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels().insert(transfer_id, tx);
        rx
    }

    pub fn unregister(&self, transfer_id: &TransferId) {
        self.channels().remove(transfer_id);
    }

    /// Whether `transfer_id` is one of ours.
    pub fn contains(&self, transfer_id: &TransferId) -> bool {
        self.channels().contains_key(transfer_id)
    }

    /// Delivers `signal` to the transfer's channel.
    ///
    /// Returns `false` if the transfer is not registered (it is incoming, or
    /// already finished).
    pub fn route(&self, transfer_id: &TransferId, signal: SenderSignal) -> bool {
        match self.channels().get(transfer_id) {
            Some(tx) => {
                // A send error means the transfer task already gave up; the
                // event still belonged to an outgoing transfer.
                let _ = tx.send(signal);
                true
            }
            None => false,
        }
    }

    /// Drops every channel so waiting transfers observe the disconnect.
    pub fn close_all(&self) {
        self.channels().clear();
    }
}
