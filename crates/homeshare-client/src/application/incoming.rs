//! ReceiveController: the receiver half of the transfer controller.
//!
//! For every announced transfer the controller keeps an
//! [`IncomingFileBuffer`] until the file is saved, rejected or failed.
//!
//! # Acceptance
//!
//! - No PIN: the offer is accepted as soon as it arrives.
//! - PIN: the offer waits for [`ReceiveController::submit_pin`].  The PIN
//!   travelled with the announcement, so the check is local; a wrong PIN
//!   leaves the offer waiting and can be retried.
//!
//! Accepting sends `accept-transfer`.  Only then does the relay start
//! forwarding chunks.

use std::path::PathBuf;
use std::sync::Arc;

use homeshare_core::{ClientEvent, PinError, TransferFailure, TransferId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::ports::{FileSink, LinkError, RelayLink, TransferObserver};
use crate::domain::{IncomingFileBuffer, IncomingOffer, StoreOutcome};

/// Errors from the receiving use case.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("no pending transfer {0}")]
    UnknownTransfer(TransferId),

    #[error("transfer {0} was already accepted")]
    AlreadyAccepted(TransferId),

    /// Wrong or incomplete PIN; the offer is still pending.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// The file could not be reassembled or written.  The buffer is gone.
    #[error("could not reconstruct {filename}: {detail}")]
    Reconstruction {
        transfer_id: TransferId,
        filename: String,
        detail: String,
    },

    #[error("could not reach relay: {0}")]
    Link(#[from] LinkError),
}

/// What happened to an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    /// No PIN required; `accept-transfer` was sent.
    AutoAccepted,
    /// The user must type the PIN.
    AwaitingPin,
    /// Same transfer id already known (redelivered announcement).
    Duplicate,
    /// The chunk count cannot describe the announced size; the relay was
    /// told and nothing was buffered.
    Refused,
}

/// What happened to a forwarded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Stored and acknowledged.
    Stored { percent: u8 },
    /// Slot already filled; not acknowledged again.
    Duplicate,
    /// No accepted buffer for this transfer, or index out of range.
    Ignored,
    /// The file is complete and was written to `path`.
    Saved(PathBuf),
}

/// Tracks every incoming transfer on one connection.
pub struct ReceiveController {
    link: Arc<dyn RelayLink>,
    sink: Arc<dyn FileSink>,
    observer: Arc<dyn TransferObserver>,
    /// In announcement order; a handful of entries at most.
    buffers: Vec<IncomingFileBuffer>,
}

impl ReceiveController {
    pub fn new(
        link: Arc<dyn RelayLink>,
        sink: Arc<dyn FileSink>,
        observer: Arc<dyn TransferObserver>,
    ) -> Self {
        Self {
            link,
            sink,
            observer,
            buffers: Vec::new(),
        }
    }

    fn position(&self, transfer_id: &TransferId) -> Option<usize> {
        self.buffers
            .iter()
            .position(|b| &b.offer().transfer_id == transfer_id)
    }

    fn take(&mut self, transfer_id: &TransferId) -> Option<IncomingFileBuffer> {
        self.position(transfer_id).map(|i| self.buffers.remove(i))
    }

    /// Number of transfers currently buffered.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    /// Offers still waiting for a PIN, oldest first.
    pub fn awaiting_pin(&self) -> Vec<&IncomingOffer> {
        self.buffers
            .iter()
            .filter(|b| !b.is_accepted() && b.offer().requires_pin())
            .map(IncomingFileBuffer::offer)
            .collect()
    }

    /// Handles a `transfer-announced` event.
    ///
    /// # Errors
    ///
    /// [`ReceiveError::Link`] if the automatic acceptance (or the refusal of
    /// a malformed offer) could not be sent.
    pub async fn on_offer(&mut self, offer: IncomingOffer) -> Result<OfferDecision, ReceiveError> {
        if self.position(&offer.transfer_id).is_some() {
            debug!("transfer {}: duplicate announcement ignored", offer.transfer_id);
            return Ok(OfferDecision::Duplicate);
        }
        if !offer.is_well_formed() {
            warn!(
                "transfer {}: refusing offer of {} chunks for {} bytes",
                offer.transfer_id, offer.total_chunks, offer.size
            );
            let failure = TransferFailure::InvalidRequest;
            self.observer
                .failed(Some(&offer.transfer_id), failure.default_message());
            self.link
                .send(ClientEvent::failure(offer.transfer_id, failure))
                .await?;
            return Ok(OfferDecision::Refused);
        }

        info!(
            "transfer {}: {} offers {} ({} bytes)",
            offer.transfer_id, offer.from_name, offer.filename, offer.size
        );
        self.observer.offer_received(&offer);
        let transfer_id = offer.transfer_id.clone();
        let requires_pin = offer.requires_pin();
        self.buffers.push(IncomingFileBuffer::new(offer));

        if requires_pin {
            return Ok(OfferDecision::AwaitingPin);
        }
        self.accept(&transfer_id).await?;
        Ok(OfferDecision::AutoAccepted)
    }

    /// Checks typed PIN input and accepts the transfer on a match.
    ///
    /// Non-digits are dropped and input is cut to four digits before the
    /// comparison.
    ///
    /// # Errors
    ///
    /// - [`ReceiveError::Pin`] on a wrong or incomplete PIN (retry allowed).
    /// - [`ReceiveError::UnknownTransfer`] if nothing is buffered under the id.
    /// - [`ReceiveError::AlreadyAccepted`] if the offer was accepted before
    ///   (offers without a PIN are accepted on arrival).
    pub async fn submit_pin(
        &mut self,
        transfer_id: &TransferId,
        input: &str,
    ) -> Result<(), ReceiveError> {
        let index = self
            .position(transfer_id)
            .ok_or_else(|| ReceiveError::UnknownTransfer(transfer_id.clone()))?;
        let buffer = &self.buffers[index];
        if buffer.is_accepted() {
            return Err(ReceiveError::AlreadyAccepted(transfer_id.clone()));
        }
        let Some(pin) = &buffer.offer().pin else {
            return Err(ReceiveError::AlreadyAccepted(transfer_id.clone()));
        };

        if let Err(e) = pin.verify(input) {
            debug!("transfer {transfer_id}: PIN rejected ({e})");
            return Err(e.into());
        }
        self.accept(transfer_id).await
    }

    async fn accept(&mut self, transfer_id: &TransferId) -> Result<(), ReceiveError> {
        let index = self
            .position(transfer_id)
            .ok_or_else(|| ReceiveError::UnknownTransfer(transfer_id.clone()))?;
        if !self.buffers[index].accept() {
            return Err(ReceiveError::AlreadyAccepted(transfer_id.clone()));
        }
        self.link
            .send(ClientEvent::AcceptTransfer {
                transfer_id: transfer_id.clone(),
            })
            .await?;
        info!("transfer {transfer_id}: accepted");
        Ok(())
    }

    /// Declines an offer (or cancels the PIN prompt) and drops its buffer.
    ///
    /// # Errors
    ///
    /// [`ReceiveError::UnknownTransfer`] if nothing is buffered under the id;
    /// [`ReceiveError::Link`] if the rejection could not be sent.
    pub async fn reject(&mut self, transfer_id: &TransferId) -> Result<(), ReceiveError> {
        self.take(transfer_id)
            .ok_or_else(|| ReceiveError::UnknownTransfer(transfer_id.clone()))?;
        info!("transfer {transfer_id}: rejected by user");
        self.link
            .send(ClientEvent::failure(
                transfer_id.clone(),
                TransferFailure::UserRejected,
            ))
            .await?;
        Ok(())
    }

    /// Handles a `chunk-forward` event.
    ///
    /// # Errors
    ///
    /// [`ReceiveError::Reconstruction`] if the finished file could not be
    /// assembled or saved; [`ReceiveError::Link`] if the ack could not be
    /// sent.
    pub async fn on_chunk(
        &mut self,
        transfer_id: &TransferId,
        chunk_index: u32,
        chunk_bytes: Vec<u8>,
        is_last: bool,
    ) -> Result<ChunkOutcome, ReceiveError> {
        let Some(index) = self.position(transfer_id) else {
            debug!("transfer {transfer_id}: chunk {chunk_index} for unknown transfer dropped");
            return Ok(ChunkOutcome::Ignored);
        };
        let buffer = &mut self.buffers[index];
        if !buffer.is_accepted() {
            debug!("transfer {transfer_id}: chunk {chunk_index} before acceptance dropped");
            return Ok(ChunkOutcome::Ignored);
        }

        match buffer.store(chunk_index, chunk_bytes) {
            StoreOutcome::Duplicate => {
                debug!("transfer {transfer_id}: duplicate chunk {chunk_index} ignored");
                return Ok(ChunkOutcome::Duplicate);
            }
            StoreOutcome::OutOfRange => {
                warn!("transfer {transfer_id}: chunk index {chunk_index} out of range");
                return Ok(ChunkOutcome::Ignored);
            }
            StoreOutcome::Stored { .. } => {}
        }

        let pct = buffer.percent();
        let ready = buffer.is_ready(is_last);
        self.link
            .send(ClientEvent::ChunkAck {
                transfer_id: transfer_id.clone(),
                chunk_index,
            })
            .await?;
        self.observer
            .progress(transfer_id, pct, &format!("Receiving... {pct}%"));

        if !ready {
            return Ok(ChunkOutcome::Stored { percent: pct });
        }
        let buffer = self.buffers.remove(index);
        self.finish(buffer).await.map(ChunkOutcome::Saved)
    }

    /// Reassembles and saves a finished buffer.
    async fn finish(&self, buffer: IncomingFileBuffer) -> Result<PathBuf, ReceiveError> {
        let offer = buffer.offer();
        let saved = match buffer.assemble() {
            Ok(bytes) => self
                .sink
                .save(&offer.filename, &bytes)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match saved {
            Ok(path) => {
                info!("transfer {}: saved {}", offer.transfer_id, path.display());
                self.observer.saved(&offer.transfer_id, &path);
                Ok(path)
            }
            Err(detail) => {
                warn!("transfer {}: {detail}", offer.transfer_id);
                self.observer.failed(
                    Some(&offer.transfer_id),
                    TransferFailure::ReconstructionFailure.default_message(),
                );
                // Best effort: the sender learns why the file never landed.
                if let Err(e) = self
                    .link
                    .send(ClientEvent::failure(
                        offer.transfer_id.clone(),
                        TransferFailure::ReconstructionFailure,
                    ))
                    .await
                {
                    debug!("transfer {}: could not report failure: {e}", offer.transfer_id);
                }
                Err(ReceiveError::Reconstruction {
                    transfer_id: offer.transfer_id.clone(),
                    filename: offer.filename.clone(),
                    detail,
                })
            }
        }
    }

    /// Handles a `transfer-error` that is not about one of our outgoing
    /// transfers.  Any buffer for the transfer is discarded.
    pub fn on_error(&mut self, transfer_id: Option<&TransferId>, message: &str) {
        if let Some(id) = transfer_id {
            if self.take(id).is_some() {
                warn!("transfer {id}: failed: {message}");
            }
        }
        self.observer.failed(transfer_id, message);
    }

    /// Drops every buffer; used when the relay connection is lost.
    pub fn clear(&mut self) {
        for buffer in self.buffers.drain(..) {
            self.observer.failed(
                Some(&buffer.offer().transfer_id),
                TransferFailure::PeerDisconnected.default_message(),
            );
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
