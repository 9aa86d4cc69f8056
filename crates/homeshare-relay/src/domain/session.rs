//! Relay-side bookkeeping for one file transfer.
//!
//! # Session lifecycle (for beginners)
//!
//! ```text
//! start-transfer ──► Announced ──accept-transfer──► Relaying ──last ack──► Completed
//!                        │                              │                     │
//!                        └──────── error / disconnect / idle ──► (removed)    └─ grace ─► (removed)
//! ```
//!
//! - `Announced`: the receiver was told about the file and has not accepted
//!   yet.  Chunks arriving now are dropped, never forwarded.
//! - `Relaying`: chunks flow sender → receiver, acks flow back.
//! - `Completed`: every chunk was acknowledged once.  The entry lingers for a
//!   short grace delay so duplicate acks still resolve against it.
//!
//! A failed session is removed on the spot, so "failed" is never a stored
//! state.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use homeshare_core::{DeviceId, TransferId};

/// Where a stored session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Announced,
    Relaying,
    Completed,
}

/// What an acknowledgement did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// A new index was counted; `acked` is the updated count.
    Counted { acked: u32 },
    /// The index was already acknowledged.
    Duplicate,
    /// The index is not in `[0, total_chunks)`.
    OutOfRange,
}

/// One in-flight transfer as the relay sees it.
///
/// Invariant: `chunks_acked() <= total_chunks`, because only distinct
/// in-range indices are counted.
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub transfer_id: TransferId,
    pub filename: String,
    pub size: u64,
    pub from: DeviceId,
    pub to: DeviceId,
    pub total_chunks: u32,
    state: SessionState,
    acked: BTreeSet<u32>,
    last_activity: Instant,
}

impl TransferSession {
    /// Creates a session in the `Announced` state.
    pub fn announce(
        transfer_id: TransferId,
        filename: String,
        size: u64,
        from: DeviceId,
        to: DeviceId,
        total_chunks: u32,
        now: Instant,
    ) -> Self {
        Self {
            transfer_id,
            filename,
            size,
            from,
            to,
            total_chunks,
            state: SessionState::Announced,
            acked: BTreeSet::new(),
            last_activity: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chunks_acked(&self) -> u32 {
        // The set never holds more than `total_chunks` (a u32) entries.
        self.acked.len() as u32
    }

    /// `true` while the session can still fail (Announced or Relaying).
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Completed
    }

    /// `true` if `device` is the sender or the receiver.
    pub fn involves(&self, device: DeviceId) -> bool {
        self.from == device || self.to == device
    }

    /// The participant that is not `device`.
    pub fn peer_of(&self, device: DeviceId) -> DeviceId {
        if self.from == device {
            self.to
        } else {
            self.from
        }
    }

    /// Moves `Announced → Relaying`.  Returns `false` in any other state.
    pub fn accept(&mut self) -> bool {
        if self.state == SessionState::Announced {
            self.state = SessionState::Relaying;
            true
        } else {
            false
        }
    }

    /// Counts an acknowledgement for `chunk_index`.
    ///
    /// Only valid while `Relaying`; callers check the state first.  Reaching
    /// `total_chunks` distinct indices moves the session to `Completed`.
    pub fn record_ack(&mut self, chunk_index: u32) -> AckOutcome {
        if chunk_index >= self.total_chunks {
            return AckOutcome::OutOfRange;
        }
        if !self.acked.insert(chunk_index) {
            return AckOutcome::Duplicate;
        }
        let acked = self.chunks_acked();
        if acked == self.total_chunks {
            self.state = SessionState::Completed;
        }
        AckOutcome::Counted { acked }
    }

    /// Records that an event for this session was just handled.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Time since the last handled event.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total_chunks: u32) -> TransferSession {
        TransferSession::announce(
            TransferId::from("t-1"),
            "photo.jpg".to_string(),
            1024,
            DeviceId::new_random(),
            DeviceId::new_random(),
            total_chunks,
            Instant::now(),
        )
    }

    #[test]
    fn test_new_session_is_announced_with_no_acks() {
        let s = session(3);
        assert_eq!(s.state(), SessionState::Announced);
        assert_eq!(s.chunks_acked(), 0);
        assert!(s.is_active());
    }

    #[test]
    fn test_accept_moves_announced_to_relaying_once() {
        // Arrange
        let mut s = session(3);

        // Act
        let first = s.accept();
        let second = s.accept();

        // Assert
        assert!(first);
        assert!(!second, "accepting twice must be a no-op");
        assert_eq!(s.state(), SessionState::Relaying);
    }

    #[test]
    fn test_completion_requires_every_distinct_index() {
        // Arrange
        let mut s = session(3);
        s.accept();

        // Act: ack 0 twice and 1 once, i.e. 3 acks but only 2 distinct
        assert_eq!(s.record_ack(0), AckOutcome::Counted { acked: 1 });
        assert_eq!(s.record_ack(0), AckOutcome::Duplicate);
        assert_eq!(s.record_ack(1), AckOutcome::Counted { acked: 2 });

        // Assert: not complete at 2/3
        assert_eq!(s.state(), SessionState::Relaying);

        // Act: the last distinct index completes it
        assert_eq!(s.record_ack(2), AckOutcome::Counted { acked: 3 });
        assert_eq!(s.state(), SessionState::Completed);
        assert!(!s.is_active());
    }

    #[test]
    fn test_out_of_range_ack_is_not_counted() {
        let mut s = session(2);
        s.accept();
        assert_eq!(s.record_ack(2), AckOutcome::OutOfRange);
        assert_eq!(s.record_ack(u32::MAX), AckOutcome::OutOfRange);
        assert_eq!(s.chunks_acked(), 0);
    }

    #[test]
    fn test_acked_never_exceeds_total() {
        let mut s = session(2);
        s.accept();
        for i in [0, 1, 1, 0, 5, 1] {
            s.record_ack(i);
        }
        assert!(s.chunks_acked() <= s.total_chunks);
        assert_eq!(s.chunks_acked(), 2);
    }

    #[test]
    fn test_peer_of_returns_the_other_participant() {
        let s = session(1);
        assert_eq!(s.peer_of(s.from), s.to);
        assert_eq!(s.peer_of(s.to), s.from);
        assert!(s.involves(s.from));
        assert!(!s.involves(DeviceId::new_random()));
    }

    #[test]
    fn test_idle_for_measures_since_last_touch() {
        // Arrange
        let start = Instant::now();
        let mut s = session(1);
        s.touch(start);

        // Act
        let later = start + Duration::from_secs(42);

        // Assert
        assert_eq!(s.idle_for(later), Duration::from_secs(42));
        assert_eq!(s.idle_for(start), Duration::ZERO);
    }
}
