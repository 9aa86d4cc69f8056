//! Receive-side buffer for one incoming file.
//!
//! # How chunks are stored (for beginners)
//!
//! Chunks are kept in a map keyed by their index, so the order in which
//! chunks *arrive* does not matter: reassembly walks the map in index order.
//! An index that is already present marks a duplicate delivery, which is
//! ignored so it can neither double-count progress nor overwrite good data.
//!
//! Nothing is reserved up front.  The announced chunk count comes from the
//! network, and memory grows only with chunks that actually arrive.

use std::collections::BTreeMap;

use homeshare_core::{assemble_chunks, percent, DeviceId, DeviceType, Pin, TransferId};
use thiserror::Error;

/// What the sender told us about the file when it announced it.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingOffer {
    pub transfer_id: TransferId,
    pub filename: String,
    pub size: u64,
    pub from: DeviceId,
    pub from_name: String,
    pub from_type: DeviceType,
    pub total_chunks: u32,
    /// The PIN the receiving user must type, if the sender asked for one.
    pub pin: Option<Pin>,
}

impl IncomingOffer {
    pub fn requires_pin(&self) -> bool {
        self.pin.is_some()
    }

    /// Whether the chunk count can describe a file of `size` bytes.
    ///
    /// Every chunk carries at least one byte, so there can be no more chunks
    /// than bytes.
    pub fn is_well_formed(&self) -> bool {
        self.total_chunks > 0 && u64::from(self.total_chunks) <= self.size
    }
}

/// Result of storing one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// New data; `received` chunks are now held.
    Stored { received: u32 },
    /// The index was already stored; nothing changed.
    Duplicate,
    /// The index is not below the announced chunk count.
    OutOfRange,
}

/// The stored chunks cannot form the announced file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("reassembled {assembled} bytes but {announced} were announced")]
pub struct AssemblyError {
    pub assembled: u64,
    pub announced: u64,
}

/// Chunks of one incoming file plus the offer they belong to.
#[derive(Debug)]
pub struct IncomingFileBuffer {
    offer: IncomingOffer,
    chunks: BTreeMap<u32, Vec<u8>>,
    received: u32,
    accepted: bool,
}

impl IncomingFileBuffer {
    pub fn new(offer: IncomingOffer) -> Self {
        Self {
            offer,
            chunks: BTreeMap::new(),
            received: 0,
            accepted: false,
        }
    }

    pub fn offer(&self) -> &IncomingOffer {
        &self.offer
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Marks the offer accepted.  Returns `false` if it already was.
    pub fn accept(&mut self) -> bool {
        !std::mem::replace(&mut self.accepted, true)
    }

    /// Stores `bytes` as chunk `index`.
    pub fn store(&mut self, index: u32, bytes: Vec<u8>) -> StoreOutcome {
        if index >= self.offer.total_chunks {
            return StoreOutcome::OutOfRange;
        }
        if self.chunks.contains_key(&index) {
            return StoreOutcome::Duplicate;
        }
        self.chunks.insert(index, bytes);
        self.received += 1;
        StoreOutcome::Stored {
            received: self.received,
        }
    }

    /// Whether the file should be finalised now.
    ///
    /// True when the chunk just stored carried `is_last`, or every announced
    /// chunk has arrived.
    pub fn is_ready(&self, last_flag_seen: bool) -> bool {
        last_flag_seen || self.received >= self.offer.total_chunks
    }

    /// Receive-side progress, `round(received / total * 100)`.
    pub fn percent(&self) -> u8 {
        percent(self.received, self.offer.total_chunks)
    }

    /// Concatenates the stored chunks in index order.
    ///
    /// Missing chunks contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError`] if the chunks add up to more bytes than the
    /// sender announced.
    pub fn assemble(&self) -> Result<Vec<u8>, AssemblyError> {
        let bytes = assemble_chunks(self.chunks.values());
        let assembled = bytes.len() as u64;
        if assembled > self.offer.size {
            return Err(AssemblyError {
                assembled,
                announced: self.offer.size,
            });
        }
        Ok(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
