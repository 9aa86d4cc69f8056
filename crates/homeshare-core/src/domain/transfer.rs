//! Transfer identifiers, PINs, and chunk arithmetic.
//!
//! # Chunking (for beginners)
//!
//! A file is never sent as one message.  The sender slices it into fixed-size
//! *chunks* (1 MiB in the reference deployment) and numbers them from zero:
//!
//! ```text
//! 2.5 MiB file, 1 MiB chunks:
//!
//!   index 0: bytes [0,       1 MiB)
//!   index 1: bytes [1 MiB,   2 MiB)
//!   index 2: bytes [2 MiB, 2.5 MiB)   ← last chunk, shorter, isLast = true
//! ```
//!
//! The transport does not promise in-order or exactly-once delivery, so the
//! receiver stores chunks by index and rebuilds the file with
//! [`assemble_chunks`] once the announced total has arrived.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::device::DeviceId;

/// Number of digits in a transfer PIN.
pub const PIN_LENGTH: usize = 4;

// ── Transfer identifier ───────────────────────────────────────────────────────

/// Unique key of one transfer session.
///
/// The sender derives it from its own device id and a millisecond timestamp,
/// so two transfers collide only if the same device starts both within the
/// same millisecond.  Uniqueness is probabilistic, not guaranteed; the relay
/// rejects a `start-transfer` that reuses a live id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

impl TransferId {
    /// Builds the id `"<device id>-<timestamp ms>"`.
    pub fn derive(sender: DeviceId, timestamp_ms: u64) -> Self {
        Self(format!("{sender}-{timestamp_ms}"))
    }

    /// Wraps an id received from the wire.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── PIN ───────────────────────────────────────────────────────────────────────

/// Errors from PIN parsing and verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PinError {
    /// The value is not exactly four decimal digits.
    #[error("PIN must be exactly {PIN_LENGTH} digits")]
    InvalidFormat,

    /// Fewer than four digits remained after filtering the user's input.
    #[error("PIN incomplete: {digits} of {PIN_LENGTH} digits entered")]
    Incomplete { digits: usize },

    /// Four digits were entered but they do not match.
    #[error("incorrect PIN, try again")]
    Mismatch,
}

/// A 4-digit shared secret gating one transfer.
///
/// This is a "LAN plus a human-shared short secret" gate, not a
/// cryptographic one: the correct PIN travels with the announcement and the
/// receiving client compares it locally.
///
/// `Debug` masks the digits so a PIN never ends up in a log line.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin(String);

impl Pin {
    /// Generates a PIN uniformly in `[1000, 9999]`.
    pub fn generate() -> Self {
        let n: u16 = rand::thread_rng().gen_range(1000..=9999);
        Self(n.to_string())
    }

    /// Parses an exact 4-digit PIN.
    ///
    /// # Errors
    ///
    /// Returns [`PinError::InvalidFormat`] for anything other than four ASCII
    /// digits.
    pub fn parse(s: &str) -> Result<Self, PinError> {
        if s.len() == PIN_LENGTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(PinError::InvalidFormat)
        }
    }

    /// Reduces raw user input to what a PIN field would hold: non-digits are
    /// dropped and the result is truncated to four digits.
    pub fn sanitize_input(raw: &str) -> String {
        raw.chars()
            .filter(char::is_ascii_digit)
            .take(PIN_LENGTH)
            .collect()
    }

    /// Checks typed input against this PIN after sanitizing it.
    ///
    /// # Errors
    ///
    /// - [`PinError::Incomplete`] if fewer than four digits were typed.
    /// - [`PinError::Mismatch`] if four digits were typed but differ.
    pub fn verify(&self, raw_input: &str) -> Result<(), PinError> {
        let typed = Self::sanitize_input(raw_input);
        if typed.len() < PIN_LENGTH {
            return Err(PinError::Incomplete { digits: typed.len() });
        }
        if typed == self.0 {
            Ok(())
        } else {
            Err(PinError::Mismatch)
        }
    }

    /// The digits, for showing to the sending user.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Pin {
    type Error = PinError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Pin> for String {
    fn from(pin: Pin) -> Self {
        pin.0
    }
}

// ── Chunk arithmetic ──────────────────────────────────────────────────────────

/// Number of chunks needed for `byte_len` bytes: `ceil(byte_len / chunk_size)`.
///
/// A `chunk_size` of zero is treated as one byte.
pub fn total_chunks(byte_len: u64, chunk_size: usize) -> u32 {
    let chunk_size = chunk_size.max(1) as u64;
    u32::try_from(byte_len.div_ceil(chunk_size)).unwrap_or(u32::MAX)
}

/// Rounded percentage `round(done / total * 100)`, capped at 100.
///
/// Returns 0 when `total` is zero.
pub fn percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(done) / f64::from(total) * 100.0).round();
    pct.min(100.0) as u8
}

/// Slices `data` into consecutive chunks of at most `chunk_size` bytes.
pub fn split_chunks(data: &[u8], chunk_size: usize) -> std::slice::Chunks<'_, u8> {
    data.chunks(chunk_size.max(1))
}

/// Concatenates the stored chunks, which must be yielded in index order.
///
/// The output length is the sum of the yielded chunks' lengths.  A chunk that
/// never arrived is simply not yielded and contributes zero bytes: a gap is
/// treated as empty, not as an error.
pub fn assemble_chunks<'a, I>(chunks: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Vec<u8>>,
    I::IntoIter: Clone,
{
    let chunks = chunks.into_iter();
    let total: usize = chunks.clone().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in chunks {
        out.extend_from_slice(chunk);
    }
    out
}

/// Formats a byte count the way the device cards show it: `"0 Bytes"`,
/// `"512 Bytes"`, `"1.5 KB"`, `"20 MB"`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0usize;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && exponent < UNITS.len() - 1 {
        scaled /= 1024.0;
        exponent += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[exponent])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_transfer_id_derive_combines_device_and_timestamp() {
        let device = DeviceId::new_random();
        let id = TransferId::derive(device, 1_700_000_000_123);
        assert_eq!(id.as_str(), format!("{device}-1700000000123"));
    }

    #[test]
    fn test_generated_pin_is_four_digits_in_range() {
        for _ in 0..200 {
            let pin = Pin::generate();
            let n: u16 = pin.as_str().parse().unwrap();
            assert!((1000..=9999).contains(&n), "PIN {n} out of range");
            assert_eq!(pin.as_str().len(), PIN_LENGTH);
        }
    }

    #[test]
    fn test_pin_parse_rejects_wrong_lengths_and_non_digits() {
        assert!(Pin::parse("1234").is_ok());
        assert_eq!(Pin::parse("123"), Err(PinError::InvalidFormat));
        assert_eq!(Pin::parse("12345"), Err(PinError::InvalidFormat));
        assert_eq!(Pin::parse("12a4"), Err(PinError::InvalidFormat));
    }

    #[test]
    fn test_sanitize_input_filters_non_digits_and_truncates() {
        assert_eq!(Pin::sanitize_input(" 4-8 2x7 9"), "4827");
        assert_eq!(Pin::sanitize_input("abc"), "");
    }

    #[test]
    fn test_verify_accepts_exact_pin() {
        let pin = Pin::parse("4821").unwrap();
        assert_eq!(pin.verify("4821"), Ok(()));
    }

    #[test]
    fn test_verify_accepts_pin_surrounded_by_non_digits() {
        // Non-digit input is filtered before comparison.
        let pin = Pin::parse("4821").unwrap();
        assert_eq!(pin.verify("48-21\n"), Ok(()));
    }

    #[test]
    fn test_verify_rejects_other_four_digit_value() {
        let pin = Pin::parse("4821").unwrap();
        assert_eq!(pin.verify("4822"), Err(PinError::Mismatch));
    }

    #[test]
    fn test_verify_reports_incomplete_input() {
        let pin = Pin::parse("4821").unwrap();
        assert_eq!(pin.verify("48"), Err(PinError::Incomplete { digits: 2 }));
    }

    #[test]
    fn test_pin_debug_does_not_reveal_digits() {
        let pin = Pin::parse("4821").unwrap();
        assert!(!format!("{pin:?}").contains("4821"));
    }

    #[test]
    fn test_pin_deserialize_rejects_invalid_value() {
        let result: Result<Pin, _> = serde_json::from_str(r#""12""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_total_chunks_rounds_up() {
        assert_eq!(total_chunks(3 * MIB as u64, MIB), 3);
        assert_eq!(total_chunks(3 * MIB as u64 - 10, MIB), 3);
        assert_eq!(total_chunks(3 * MIB as u64 + 1, MIB), 4);
        assert_eq!(total_chunks(1, MIB), 1);
        assert_eq!(total_chunks(0, MIB), 0);
    }

    #[test]
    fn test_percent_rounds_to_nearest() {
        assert_eq!(percent(0, 3), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(1, 8), 13); // 12.5 rounds up
    }

    #[test]
    fn test_percent_of_zero_total_is_zero() {
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn test_split_chunks_last_chunk_holds_remainder() {
        let data = vec![7u8; 10];
        let chunks: Vec<&[u8]> = split_chunks(&data, 4).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 2);
    }

    #[test]
    fn test_assemble_chunks_restores_index_order() {
        let chunks = vec![
            Some(b"ab".to_vec()),
            Some(b"cd".to_vec()),
            Some(b"e".to_vec()),
        ];
        assert_eq!(assemble_chunks(chunks.iter().flatten()), b"abcde");
    }

    #[test]
    fn test_assemble_chunks_treats_gap_as_empty() {
        let chunks = vec![Some(b"ab".to_vec()), None, Some(b"e".to_vec())];
        let out = assemble_chunks(chunks.iter().flatten());
        assert_eq!(out, b"abe");
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(20 * MIB as u64), "20 MB");
    }
}
