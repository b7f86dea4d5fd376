//! Shared types for the vitrine signage system
//!
//! The synchronized document, its models, the wire frames and the error
//! types used by both the relay and the surfaces.

pub mod app_state;
pub mod error;
pub mod message;
pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use http;
pub use rust_decimal::Decimal;
pub use serde::{Deserialize, Serialize};

pub use app_state::{AppState, Orientation};
pub use message::{Frame, RemoteCommand, Revision};
pub use types::{RoomCode, Timestamp};
