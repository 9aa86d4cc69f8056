//! Device registry: who is connected right now, and under which name.
//!
//! Each entry lives exactly as long as its WebSocket connection.  The registry
//! also owns the [`NameBook`] so a device's display name is released the
//! moment the device leaves.
//!
//! # Ordering
//!
//! Presence lists are returned in registration order.  A `HashMap` gives O(1)
//! lookup by id; a separate `Vec` of ids remembers the order devices arrived
//! in so every client sees a stable list.

use std::collections::HashMap;

use homeshare_core::{Device, DeviceId, DeviceType, NameBook};

/// The user agent recorded until a device reports its real one.
pub const UNKNOWN_USER_AGENT: &str = "Unknown";

/// In-memory registry of connected devices.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, Device>,
    order: Vec<DeviceId>,
    names: NameBook<DeviceId>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly connected device and returns it.
    ///
    /// The device gets a unique display name and `provisional_type` until it
    /// reports its real type.  Registering an id that is already present
    /// returns the existing entry unchanged, so the same id can never appear
    /// twice in a presence list.
    pub fn register(
        &mut self,
        id: DeviceId,
        provisional_type: DeviceType,
        connected_at: u64,
    ) -> Device {
        if let Some(existing) = self.devices.get(&id) {
            return existing.clone();
        }

        let device = Device {
            id,
            name: self.names.unique_for(&id),
            connected_at,
            device_type: provisional_type,
            user_agent: UNKNOWN_USER_AGENT.to_string(),
        };
        self.devices.insert(id, device.clone());
        self.order.push(id);
        device
    }

    /// Updates a device's type and user agent in place.
    ///
    /// The display name is kept.  Returns `false` if `id` is not registered.
    pub fn update_info(&mut self, id: DeviceId, device_type: DeviceType, user_agent: &str) -> bool {
        match self.devices.get_mut(&id) {
            Some(device) => {
                device.device_type = device_type;
                device.user_agent = user_agent.to_string();
                true
            }
            None => false,
        }
    }

    /// Removes a device and releases its display name.
    pub fn unregister(&mut self, id: DeviceId) -> Option<Device> {
        let removed = self.devices.remove(&id)?;
        self.order.retain(|known| *known != id);
        self.names.release(&id);
        Some(removed)
    }

    /// Every connected device except `excluding`, in registration order.
    pub fn list(&self, excluding: Option<DeviceId>) -> Vec<Device> {
        self.order
            .iter()
            .filter(|id| Some(**id) != excluding)
            .filter_map(|id| self.devices.get(id))
            .cloned()
            .collect()
    }

    /// Ids of every connected device, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.order.iter().copied()
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forgets every device and every assigned name.
    pub fn clear(&mut self) {
        self.devices.clear();
        self.order.clear();
        self.names.clear();
    }
}
