//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::ProductNotFound | Self::PromotionNotFound | Self::RoomNotFound => {
                StatusCode::NOT_FOUND
            }

            Self::ValidationFailed
            | Self::InvalidFormat
            | Self::InvalidPrice
            | Self::InvalidRoomCode => StatusCode::BAD_REQUEST,
        }
    }
}
