//! Common types for the shared crate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// Maximum accepted room code length
pub const ROOM_CODE_MAX_LEN: usize = 32;

/// Room code shared by every surface of one shop
///
/// Short and human-memorable; it scopes traffic but is not a secret.
/// Always stored upper-case so `abc123` and `ABC123` address the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: &str) -> Result<Self, InvalidRoomCode> {
        let code = code.trim();
        if code.is_empty() || code.len() > ROOM_CODE_MAX_LEN {
            return Err(InvalidRoomCode(code.to_string()));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(InvalidRoomCode(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Random 6-character code, e.g. `K7QX2M`
    pub fn generate() -> Self {
        Self(crate::util::generate_room_code())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomCode {
    type Err = InvalidRoomCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = InvalidRoomCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Rejected room code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid room code: {0:?}")]
pub struct InvalidRoomCode(pub String);
