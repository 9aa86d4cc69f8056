//! # homeshare-core
//!
//! Shared library for HomeShare containing the device and transfer domain
//! types, the display-name generator, and the JSON event protocol spoken
//! between the relay and its clients.
//!
//! This crate is used by both the relay and the client applications.
//! It has zero dependencies on sockets, async runtimes, or the filesystem.
//!
//! # Architecture overview (for beginners)
//!
//! HomeShare lets devices on the same local network send files to each
//! other.  Every device opens one WebSocket to a *relay*; the relay keeps a
//! presence list, and a file travels `sender → relay → receiver` in fixed-size
//! chunks.  A transfer may be protected with a 4-digit PIN that the receiving
//! user must type before any chunk is released.
//!
//! This crate (`homeshare-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Devices, device types, transfer identifiers, PINs, chunk
//!   arithmetic (splitting and reassembly), and the failure taxonomy.
//!
//! - **`names`** – Human-readable display names such as `"Amber Falcon"`,
//!   with best-effort uniqueness per connected device.
//!
//! - **`protocol`** – The events that travel over the WebSocket, and the codec
//!   that turns them into JSON text frames and back.

pub mod domain;
pub mod names;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `homeshare_core::Device` instead of `homeshare_core::domain::device::Device`.
pub use domain::device::{Device, DeviceId, DeviceType};
pub use domain::failure::TransferFailure;
pub use domain::transfer::{
    assemble_chunks, format_size, percent, split_chunks, total_chunks, Pin, PinError, TransferId,
};
pub use names::{NameBook, NameGenerator};
pub use protocol::codec::{decode_client_event, decode_relay_event, encode_event, ProtocolError};
pub use protocol::events::{ClientEvent, RelayEvent};
