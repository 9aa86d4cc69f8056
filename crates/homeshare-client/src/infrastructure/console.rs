//! Terminal presentation of transfer notifications.

use std::path::Path;

use homeshare_core::{format_size, Device, TransferId};

use crate::application::ports::TransferObserver;
use crate::domain::IncomingOffer;

/// Prints status lines to stdout.
#[derive(Debug, Default)]
pub struct ConsoleObserver;

/// One line describing an incoming offer.
pub fn describe_offer(offer: &IncomingOffer) -> String {
    let lock = if offer.requires_pin() {
        " [PIN required]"
    } else {
        ""
    };
    format!(
        "{} ({}) wants to send {} ({}){lock}",
        offer.from_name,
        offer.from_type.display_name(),
        offer.filename,
        format_size(offer.size)
    )
}

/// One line describing a device in the presence list.
pub fn describe_device(device: &Device) -> String {
    format!(
        "{:<24} {:<9} {}",
        device.name,
        device.device_type.display_name(),
        device.id
    )
}

impl TransferObserver for ConsoleObserver {
    fn offer_received(&self, offer: &IncomingOffer) {
        println!("{}", describe_offer(offer));
        if offer.requires_pin() {
            println!("Type the 4-digit PIN shown on the sender (or 'n' to decline):");
        }
    }

    fn progress(&self, _transfer_id: &TransferId, _percent: u8, status: &str) {
        println!("  {status}");
    }

    fn saved(&self, _transfer_id: &TransferId, path: &Path) {
        println!("Saved {}", path.display());
    }

    fn completed(&self, _transfer_id: &TransferId, filename: &str) {
        println!("Transfer complete: {filename}");
    }

    fn failed(&self, _transfer_id: Option<&TransferId>, message: &str) {
        println!("Transfer failed: {message}");
    }
}
