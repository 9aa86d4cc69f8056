//! Connected devices and their kinds.
//!
//! A [`Device`] exists for exactly as long as its WebSocket connection does.
//! The relay creates it with a provisional [`DeviceType::Desktop`] type when
//! the socket opens, updates it once the client reports what it really is, and
//! forgets it when the socket closes.  Nothing about a device survives a
//! relay restart.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque connection identifier assigned by the relay.
///
/// Serialized as the bare UUID string so it reads naturally in JSON:
/// `"id":"550e8400-e29b-41d4-a716-446655440000"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Allocates a fresh random identifier for a new connection.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses the canonical hyphenated UUID form.
    ///
    /// Returns `None` for anything that is not a UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of hardware a device runs on.
///
/// A closed set: every lookup (`display_name`, `icon`) is an exhaustive
/// `match`, so adding a variant is a compile error until every lookup
/// handles it.
///
/// The aliases accept the short spellings older browser clients send
/// (`"ios"`, `"android"`, `"mobile"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    #[default]
    Desktop,
    #[serde(alias = "ios")]
    MobileIos,
    #[serde(alias = "android", alias = "mobile")]
    MobileAndroid,
    Tablet,
}

impl DeviceType {
    /// Classifies a browser user-agent string.
    ///
    /// iPads and anything advertising itself as a tablet map to
    /// [`DeviceType::Tablet`]; other Apple handhelds to
    /// [`DeviceType::MobileIos`]; Android to [`DeviceType::MobileAndroid`];
    /// everything else (including an empty string) to
    /// [`DeviceType::Desktop`].
    pub fn detect(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("ipad") || ua.contains("tablet") {
            DeviceType::Tablet
        } else if ua.contains("iphone") || ua.contains("ipod") {
            DeviceType::MobileIos
        } else if ua.contains("android") {
            DeviceType::MobileAndroid
        } else {
            DeviceType::Desktop
        }
    }

    /// The device type of the machine this code was compiled for.
    pub fn for_host() -> Self {
        if cfg!(target_os = "ios") {
            DeviceType::MobileIos
        } else if cfg!(target_os = "android") {
            DeviceType::MobileAndroid
        } else {
            DeviceType::Desktop
        }
    }

    /// Human-readable label for device cards and prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            DeviceType::Desktop => "Computer",
            DeviceType::MobileIos => "iPhone",
            DeviceType::MobileAndroid => "Android",
            DeviceType::Tablet => "Tablet",
        }
    }

    /// Icon identifier for the presentation layer.
    pub fn icon(self) -> &'static str {
        match self {
            DeviceType::Desktop => "monitor",
            DeviceType::MobileIos | DeviceType::MobileAndroid => "smartphone",
            DeviceType::Tablet => "tablet",
        }
    }
}

/// A device currently connected to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    /// Display name assigned by the relay (see [`crate::names`]).
    pub name: String,
    /// Connection time in milliseconds since the Unix epoch.
    pub connected_at: u64,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub user_agent: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
