//! Vitrine client - signage surfaces kept in sync through a relay
//!
//! A node runs one surface (editor, companion or display) over a local
//! replica of the shop document. The [`sync`] layer keeps the replica in
//! step with the rest of the room.

pub mod config;
pub mod display;
pub mod error;
pub mod genai;
pub mod logger;
pub mod message;
pub mod storage;
pub mod surface;
pub mod sync;

pub use config::{ClientConfig, DEFAULT_RELAY_URL};
pub use error::{ClientError, ClientResult};
pub use storage::Storage;

// Sync layer
pub use message::{Backoff, ConnectionStatus, Connector, MemoryConnector, SyncConfig, WsConnector};
pub use sync::{SyncClient, SyncEvent, SyncHandle};

// Surfaces
pub use display::{DisplayMachine, DisplayMode, Screen};
pub use genai::{AspectRatio, ContentGenerator, GeminiClient, GenAiConfig};
pub use surface::{Companion, DisplayOptions, DisplaySurface, Editor};
