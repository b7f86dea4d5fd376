//! Unified error system
//!
//! - [`ErrorCode`]: numeric codes shared by relay, clients and HTTP bodies
//! - [`ErrorCategory`]: classification by code range
//! - [`AppError`]: error with code, message and optional details
//! - [`ApiResponse`]: JSON envelope returned by the relay's HTTP routes
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::with_message(ErrorCode::InvalidRoomCode, "room code must be alphanumeric")
//!     .with_detail("room", "a b");
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(7002));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};

impl From<crate::types::InvalidRoomCode> for AppError {
    fn from(err: crate::types::InvalidRoomCode) -> Self {
        AppError::with_message(ErrorCode::InvalidRoomCode, err.to_string()).with_detail("room", err.0)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::with_message(ErrorCode::InvalidFormat, err.to_string())
    }
}
