//! Application layer: the client's transfer use cases.
//!
//! - [`outgoing`]: send one file (sender half).
//! - [`incoming`]: accept, buffer and save files (receiver half).
//! - [`router`]: dispatch relay events to the two halves.
//! - [`ports`]: traits implemented by the infrastructure layer.

pub mod incoming;
pub mod outgoing;
pub mod ports;
pub mod router;
pub mod signals;

#[cfg(test)]
pub(crate) mod test_support;

pub use incoming::{ChunkOutcome, OfferDecision, ReceiveController, ReceiveError};
pub use outgoing::{LocalDevice, PreparedSend, SendError, SendFileUseCase};
pub use ports::{FileSink, LinkError, RelayLink, SinkError, TransferObserver};
pub use router::{dedupe_devices, EventRouter, Presence};
pub use signals::{OutgoingSignals, SenderSignal};
