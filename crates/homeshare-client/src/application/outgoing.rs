//! SendFileUseCase: the sender half of the transfer controller.
//!
//! # Sequence
//!
//! ```text
//! sender                         relay                      receiver
//!   │── start-transfer ──────────▶│── transfer-announced ────▶│
//!   │                             │◀──── accept-transfer ─────│ (after PIN)
//!   │◀──── transfer-accepted ─────│                           │
//!   │── chunk 0 ─────────────────▶│── chunk-forward 0 ───────▶│
//!   │   (pacing)                  │◀──── chunk-ack 0 ─────────│
//!   │── chunk 1 (isLast) ────────▶│── chunk-forward 1 ───────▶│
//!   │                             │◀──── chunk-ack 1 ─────────│
//!   │◀──── complete ──────────────│── complete ──────────────▶│
//! ```
//!
//! Chunks are emitted strictly in index order, one at a time.  Nothing is
//! resumed: any failure ends the transfer and a retry needs a new id.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use homeshare_core::{
    percent, split_chunks, total_chunks, ClientEvent, DeviceId, DeviceType, Pin,
    TransferFailure, TransferId,
};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::application::ports::{LinkError, RelayLink, TransferObserver};
use crate::application::signals::{OutgoingSignals, SenderSignal};
use crate::domain::ClientConfig;

/// Errors that end an outgoing transfer.
#[derive(Debug, Error)]
pub enum SendError {
    /// Empty files are refused: zero chunks could never complete.
    #[error("cannot send an empty file")]
    EmptyFile,

    #[error("file is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    /// The receiver neither accepted nor declined in time.
    #[error("receiver did not accept within {}s", .0.as_secs())]
    AcceptTimeout(Duration),

    /// Every chunk was sent but the relay never confirmed completion.
    #[error("relay did not confirm completion within {}s", .0.as_secs())]
    CompletionTimeout(Duration),

    /// The relay or the receiver reported a failure.
    #[error("transfer failed: {message}")]
    Failed {
        message: String,
        reason: Option<TransferFailure>,
    },

    /// The connection to the relay dropped while waiting.
    #[error("connection to relay lost")]
    Disconnected,

    #[error("could not reach relay: {0}")]
    Link(#[from] LinkError),
}

/// Who we are, as the relay knows us.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDevice {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
}

/// A validated transfer, ready to run.
///
/// Produced by [`SendFileUseCase::prepare`] so the caller can show the PIN
/// to its user before the transfer starts.
#[derive(Debug)]
pub struct PreparedSend {
    pub transfer_id: TransferId,
    pub target: DeviceId,
    pub filename: String,
    pub pin: Option<Pin>,
    from: LocalDevice,
    data: Vec<u8>,
    total_chunks: u32,
}

impl PreparedSend {
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Which relay signal a wait is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Milestone {
    Accepted,
    Complete,
}

/// Sends one file at a time through the relay.
///
/// The use case is cheap to share: several transfers to different targets
/// may run concurrently, each in its own task.
pub struct SendFileUseCase {
    link: Arc<dyn RelayLink>,
    signals: OutgoingSignals,
    observer: Arc<dyn TransferObserver>,
    chunk_size: usize,
    max_file_size: u64,
    pacing: Duration,
    accept_timeout: Duration,
}

impl SendFileUseCase {
    pub fn new(
        link: Arc<dyn RelayLink>,
        signals: OutgoingSignals,
        observer: Arc<dyn TransferObserver>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            link,
            signals,
            observer,
            chunk_size: config.chunk_size.max(1),
            max_file_size: config.max_file_size,
            pacing: config.chunk_pacing,
            accept_timeout: config.accept_timeout,
        }
    }

    /// Validates the file and fixes the transfer id, chunk count and PIN.
    ///
    /// # Errors
    ///
    /// [`SendError::EmptyFile`] or [`SendError::TooLarge`]; nothing has been
    /// sent to the relay in either case.
    pub fn prepare(
        &self,
        from: &LocalDevice,
        target: DeviceId,
        filename: impl Into<String>,
        data: Vec<u8>,
        use_pin: bool,
    ) -> Result<PreparedSend, SendError> {
        let size = data.len() as u64;
        if size == 0 {
            return Err(SendError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(SendError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(PreparedSend {
            transfer_id: TransferId::derive(from.id, unix_millis()),
            target,
            filename: filename.into(),
            pin: use_pin.then(Pin::generate),
            from: from.clone(),
            total_chunks: total_chunks(size, self.chunk_size),
            data,
        })
    }

    /// Runs a prepared transfer to completion.
    ///
    /// # Errors
    ///
    /// Any [`SendError`] other than the two `prepare` returns.  On an
    /// acceptance or completion timeout the relay is told to drop the session.
    pub async fn run(&self, prepared: PreparedSend) -> Result<TransferId, SendError> {
        let transfer_id = prepared.transfer_id.clone();
        let mut signals = self.signals.register(transfer_id.clone());
        let result = self.drive(&prepared, &mut signals).await;
        self.signals.unregister(&transfer_id);

        match &result {
            Ok(()) => info!("transfer {transfer_id}: {} delivered", prepared.filename),
            Err(e) => warn!("transfer {transfer_id}: {e}"),
        }
        result.map(|()| transfer_id)
    }

    async fn drive(
        &self,
        prepared: &PreparedSend,
        signals: &mut mpsc::UnboundedReceiver<SenderSignal>,
    ) -> Result<(), SendError> {
        let id = &prepared.transfer_id;

        // ── Announce ──────────────────────────────────────────────────────────
        self.link
            .send(ClientEvent::StartTransfer {
                target_id: prepared.target,
                filename: prepared.filename.clone(),
                size: prepared.size(),
                total_chunks: prepared.total_chunks,
                transfer_id: id.clone(),
                from_name: prepared.from.name.clone(),
                from_type: prepared.from.device_type,
                requires_pin: prepared.pin.is_some(),
                pin: prepared.pin.clone(),
            })
            .await?;
        info!(
            "transfer {id}: offered {} ({} bytes, {} chunks) to {}",
            prepared.filename,
            prepared.size(),
            prepared.total_chunks,
            prepared.target
        );

        // ── Wait for the receiver ─────────────────────────────────────────────
        match timeout(self.accept_timeout, self.wait_for(id, signals, Milestone::Accepted)).await {
            Ok(result) => result?,
            Err(_) => {
                self.abandon(id, "receiver did not accept in time").await;
                return Err(SendError::AcceptTimeout(self.accept_timeout));
            }
        }

        // ── Emit chunks ───────────────────────────────────────────────────────
        let total = prepared.total_chunks;
        for (index, bytes) in split_chunks(&prepared.data, self.chunk_size).enumerate() {
            let index = index as u32;
            self.drain(id, signals)?;
            if index > 0 && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }

            self.link
                .send(ClientEvent::Chunk {
                    transfer_id: id.clone(),
                    chunk_index: index,
                    chunk_bytes: bytes.to_vec(),
                    is_last: index + 1 == total,
                })
                .await?;

            let pct = percent(index + 1, total);
            debug!("transfer {id}: chunk {index}/{total} sent");
            self.observer
                .progress(id, pct, &format!("Sending... {pct}%"));
        }

        // ── Wait for the last acknowledgement ─────────────────────────────────
        match timeout(self.accept_timeout, self.wait_for(id, signals, Milestone::Complete)).await {
            Ok(result) => result,
            Err(_) => {
                self.abandon(id, "receiver did not finish in time").await;
                Err(SendError::CompletionTimeout(self.accept_timeout))
            }
        }
    }

    /// Tells the relay to drop a transfer this side gave up on.
    ///
    /// Best effort: the send is already failing, so a dead link changes nothing.
    async fn abandon(&self, id: &TransferId, message: &str) {
        let _ = self
            .link
            .send(ClientEvent::TransferError {
                transfer_id: Some(id.clone()),
                message: message.to_string(),
                reason: Some(TransferFailure::IdleTimeout),
            })
            .await;
    }

    /// Consumes signals until `milestone` arrives.
    async fn wait_for(
        &self,
        id: &TransferId,
        signals: &mut mpsc::UnboundedReceiver<SenderSignal>,
        milestone: Milestone,
    ) -> Result<(), SendError> {
        loop {
            let Some(signal) = signals.recv().await else {
                return Err(SendError::Disconnected);
            };
            match (signal, milestone) {
                (SenderSignal::Accepted, Milestone::Accepted)
                | (SenderSignal::Complete, Milestone::Complete) => return Ok(()),
                (other, _) => self.absorb(id, other)?,
            }
        }
    }

    /// Handles whatever arrived while chunks were being sent.
    fn drain(
        &self,
        id: &TransferId,
        signals: &mut mpsc::UnboundedReceiver<SenderSignal>,
    ) -> Result<(), SendError> {
        loop {
            match signals.try_recv() {
                Ok(signal) => self.absorb(id, signal)?,
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(SendError::Disconnected),
            }
        }
    }

    fn absorb(&self, id: &TransferId, signal: SenderSignal) -> Result<(), SendError> {
        match signal {
            SenderSignal::Progress { percent, status } => {
                self.observer.progress(id, percent, &status);
                Ok(())
            }
            SenderSignal::Failed { message, reason } => Err(SendError::Failed { message, reason }),
            other => {
                debug!("transfer {id}: ignoring out-of-step signal {other:?}");
                Ok(())
            }
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
