//! Recording test doubles for the application-layer ports.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use homeshare_core::{ClientEvent, TransferFailure, TransferId};

use crate::application::ports::{FileSink, LinkError, RelayLink, SinkError, TransferObserver};
use crate::application::signals::{OutgoingSignals, SenderSignal};
use crate::domain::IncomingOffer;

// ── RecordingLink ─────────────────────────────────────────────────────────────

/// Records every event and can play a minimal relay towards the sender.
#[derive(Default)]
pub struct RecordingLink {
    sent: Mutex<Vec<ClientEvent>>,
    signals: OutgoingSignals,
    accept: bool,
    complete: bool,
    reject: bool,
    close_after_chunks: Option<usize>,
    chunks: AtomicUsize,
    closed: AtomicBool,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `start-transfer` with `transfer-accepted`.
    pub fn accepting(mut self) -> Self {
        self.accept = true;
        self
    }

    /// Answer the `isLast` chunk with `complete`.
    pub fn completing(mut self) -> Self {
        self.complete = true;
        self
    }

    /// Answer every `start-transfer` with a user rejection.
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Fail every send after `n` chunks went through.
    pub fn closing_after_chunks(mut self, n: usize) -> Self {
        self.close_after_chunks = Some(n);
        self
    }

    pub fn signals(&self) -> OutgoingSignals {
        self.signals.clone()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayLink for RecordingLink {
    async fn send(&self, event: ClientEvent) -> Result<(), LinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }

        match &event {
            ClientEvent::StartTransfer { transfer_id, .. } => {
                if self.reject {
                    self.signals.route(
                        transfer_id,
                        SenderSignal::Failed {
                            message: TransferFailure::UserRejected.default_message().to_string(),
                            reason: Some(TransferFailure::UserRejected),
                        },
                    );
                } else if self.accept {
                    self.signals.route(transfer_id, SenderSignal::Accepted);
                }
            }
            ClientEvent::Chunk {
                transfer_id,
                is_last,
                ..
            } => {
                let n = self.chunks.fetch_add(1, Ordering::SeqCst) + 1;
                if self.close_after_chunks == Some(n) {
                    self.close();
                }
                if *is_last && self.complete {
                    self.signals.route(transfer_id, SenderSignal::Complete);
                }
            }
            _ => {}
        }

        self.sent.lock().unwrap().push(event);
        Ok(())
    }
}

// ── RecordingObserver ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Offer(IncomingOffer),
    Progress {
        transfer_id: TransferId,
        percent: u8,
        status: String,
    },
    Saved(TransferId, PathBuf),
    Completed(TransferId, String),
    Failed(Option<TransferId>, String),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Observed) {
        self.events.lock().unwrap().push(event);
    }
}

impl TransferObserver for RecordingObserver {
    fn offer_received(&self, offer: &IncomingOffer) {
        self.push(Observed::Offer(offer.clone()));
    }

    fn progress(&self, transfer_id: &TransferId, percent: u8, status: &str) {
        self.push(Observed::Progress {
            transfer_id: transfer_id.clone(),
            percent,
            status: status.to_string(),
        });
    }

    fn saved(&self, transfer_id: &TransferId, path: &Path) {
        self.push(Observed::Saved(transfer_id.clone(), path.to_path_buf()));
    }

    fn completed(&self, transfer_id: &TransferId, filename: &str) {
        self.push(Observed::Completed(transfer_id.clone(), filename.to_string()));
    }

    fn failed(&self, transfer_id: Option<&TransferId>, message: &str) {
        self.push(Observed::Failed(transfer_id.cloned(), message.to_string()));
    }
}

// ── MemorySink ────────────────────────────────────────────────────────────────

/// Keeps saved files in memory, or fails every save.
#[derive(Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSink for MemorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> {
        if self.fail {
            return Err(SinkError::NoFreeName(filename.to_string()));
        }
        self.files
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.to_vec()));
        Ok(PathBuf::from("/downloads").join(filename))
    }
}
