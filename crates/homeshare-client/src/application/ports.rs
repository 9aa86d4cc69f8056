//! Traits the application layer depends on, implemented by infrastructure.
//!
//! Use cases never touch a socket or the filesystem directly.  They are given
//! an `Arc<dyn RelayLink>`, an `Arc<dyn FileSink>` and an
//! `Arc<dyn TransferObserver>` at construction time, which lets every test
//! swap in a recording double.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use homeshare_core::{ClientEvent, ProtocolError, TransferId};
use thiserror::Error;

use crate::domain::IncomingOffer;

// ── Relay link ────────────────────────────────────────────────────────────────

/// Errors from pushing an event towards the relay.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The connection to the relay is gone.
    #[error("relay connection closed")]
    Closed,
    /// The event could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Outbound half of the connection to the relay.
#[async_trait]
pub trait RelayLink: Send + Sync {
    /// Queues `event` for delivery to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] once the connection has dropped.
    async fn send(&self, event: ClientEvent) -> Result<(), LinkError>;
}

// ── Download sink ─────────────────────────────────────────────────────────────

/// Errors from persisting a received file.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Every candidate name (`name (1).ext`, `name (2).ext`, ...) is taken.
    #[error("no free file name for '{0}'")]
    NoFreeName(String),
}

/// Where completed incoming files go.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Persists `bytes` under (a sanitised form of) `filename` and returns the
    /// path actually written.  Never overwrites an existing file.
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError>;
}

// ── Presentation ──────────────────────────────────────────────────────────────

/// Receives user-visible transfer notifications.
///
/// The CLI prints them; a GUI would render cards and progress bars.
pub trait TransferObserver: Send + Sync {
    /// A sender offered us a file.  When the offer carries a PIN the user
    /// must be asked for it.
    fn offer_received(&self, offer: &IncomingOffer);

    /// Progress for a transfer in either direction.
    fn progress(&self, transfer_id: &TransferId, percent: u8, status: &str);

    /// A received file was written to disk.
    fn saved(&self, transfer_id: &TransferId, path: &Path);

    /// The relay reported that every chunk was acknowledged.
    fn completed(&self, transfer_id: &TransferId, filename: &str);

    /// A transfer (or a request without a transfer) failed.
    fn failed(&self, transfer_id: Option<&TransferId>, message: &str);
}
