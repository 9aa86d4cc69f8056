//! Domain layer: client configuration and the receive-side file buffer.

pub mod config;
pub mod incoming;

pub use config::ClientConfig;
pub use incoming::{AssemblyError, IncomingFileBuffer, IncomingOffer, StoreOutcome};
