//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 6xxx: Catalog errors (products, promotions, prices)
//! - 7xxx: Sync errors (rooms)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Invalid format
    InvalidFormat = 6,

    // ==================== 6xxx: Catalog ====================
    ProductNotFound = 6001,
    PromotionNotFound = 6002,
    /// Negative or otherwise unusable price
    InvalidPrice = 6003,

    // ==================== 7xxx: Sync ====================
    /// Room holds no document yet
    RoomNotFound = 7001,
    InvalidRoomCode = 7002,
}

impl ErrorCode {
    /// Numeric value of this code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Default human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::ValidationFailed => "Validation failed",
            Self::InvalidFormat => "Invalid format",

            Self::ProductNotFound => "Product not found",
            Self::PromotionNotFound => "Promotion not found",
            Self::InvalidPrice => "Invalid price",

            Self::RoomNotFound => "Room not found",
            Self::InvalidRoomCode => "Invalid room code",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

/// Unknown numeric error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            2 => Self::ValidationFailed,
            6 => Self::InvalidFormat,

            6001 => Self::ProductNotFound,
            6002 => Self::PromotionNotFound,
            6003 => Self::InvalidPrice,

            7001 => Self::RoomNotFound,
            7002 => Self::InvalidRoomCode,

            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}
