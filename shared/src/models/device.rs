//! Device / surface identity models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::Timestamp;

/// Surface role a node runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full-screen TV view
    Display,
    /// Reduced phone editor
    Companion,
    /// Admin panel
    #[default]
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Companion => "companion",
            Self::Editor => "editor",
        }
    }

    /// Only the editor keeps a device roster
    pub fn tracks_roster(&self) -> bool {
        matches!(self, Self::Editor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "display" | "tv" => Ok(Self::Display),
            "companion" | "remote" => Ok(Self::Companion),
            "editor" | "admin" => Ok(Self::Editor),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Device identifier, stable per installation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id, e.g. `DEV-7F3A9C`
    pub fn generate() -> Self {
        Self(crate::util::generate_device_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Roster status derived from the last announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// Roster entry kept by the editor surface (never persisted or synced)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Local receipt time of the last announcement (Unix ms)
    pub last_seen: Timestamp,
    pub status: DeviceStatus,
}

impl DeviceRecord {
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("display".parse::<Role>().unwrap(), Role::Display);
        assert_eq!("TV".parse::<Role>().unwrap(), Role::Display);
        assert_eq!(" Companion ".parse::<Role>().unwrap(), Role::Companion);
        assert_eq!("editor".parse::<Role>().unwrap(), Role::Editor);
        assert!("kiosk".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Editor);
    }

    #[test]
    fn test_device_id_transparent() {
        let id = DeviceId::new("DEV-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"DEV-1\"");
        assert!(DeviceId::generate().as_str().starts_with("DEV-"));
    }

    #[test]
    fn test_status_wire_codes() {
        assert_eq!(
            serde_json::to_string(&DeviceStatus::Offline).unwrap(),
            "\"OFFLINE\""
        );
    }
}
