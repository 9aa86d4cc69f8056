//! Transfer session store: at most one session per transfer id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use homeshare_core::{DeviceId, TransferId};

use crate::domain::session::TransferSession;

/// In-memory map of transfer id to session.
///
/// Only the relay engine mutates it.  Raw map access is not exposed so the
/// one-session-per-id rule cannot be bypassed.
#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<TransferId, TransferSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new session.
    ///
    /// Returns the session back as `Err` if its id is already taken.
    pub fn insert(&mut self, session: TransferSession) -> Result<(), TransferSession> {
        if self.sessions.contains_key(&session.transfer_id) {
            return Err(session);
        }
        self.sessions.insert(session.transfer_id.clone(), session);
        Ok(())
    }

    pub fn contains(&self, transfer_id: &TransferId) -> bool {
        self.sessions.contains_key(transfer_id)
    }

    pub fn get(&self, transfer_id: &TransferId) -> Option<&TransferSession> {
        self.sessions.get(transfer_id)
    }

    pub fn get_mut(&mut self, transfer_id: &TransferId) -> Option<&mut TransferSession> {
        self.sessions.get_mut(transfer_id)
    }

    pub fn remove(&mut self, transfer_id: &TransferId) -> Option<TransferSession> {
        self.sessions.remove(transfer_id)
    }

    /// Ids of active (not yet completed) sessions that `device` takes part in.
    pub fn active_involving(&self, device: DeviceId) -> Vec<TransferId> {
        let mut ids: Vec<TransferId> = self
            .sessions
            .values()
            .filter(|s| s.is_active() && s.involves(device))
            .map(|s| s.transfer_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Ids of active sessions idle for longer than `timeout` at `now`.
    pub fn idle(&self, now: Instant, timeout: Duration) -> Vec<TransferId> {
        let mut ids: Vec<TransferId> = self
            .sessions
            .values()
            .filter(|s| s.is_active() && s.idle_for(now) > timeout)
            .map(|s| s.transfer_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
