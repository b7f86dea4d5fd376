//! Client configuration

use shared::RoomCode;
use shared::models::{DeviceId, Role};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ClientResult;
use crate::genai::{ContentGenerator, GeminiClient, GenAiConfig};
use crate::message::SyncConfig;
use crate::storage::Storage;

/// Default relay endpoint for a shop LAN
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:9700/ws";

/// Configuration of one surface node
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay WebSocket URL (`ws://` or `wss://`)
    pub relay_url: String,

    /// Room shared by every surface of the shop
    pub room: RoomCode,

    /// Stable id of this installation
    pub device_id: DeviceId,

    /// Surface this node starts as
    pub role: Role,

    /// Directory holding `state.json` and `room`
    pub data_dir: PathBuf,

    /// Address announced in presence frames
    pub advertised_ip: Option<String>,

    /// Reconnect, presence and echo timing
    pub sync: SyncConfig,

    /// Generative content endpoint; `None` disables generation
    pub genai: Option<GenAiConfig>,
}

impl ClientConfig {
    pub fn new(room: RoomCode) -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            room,
            device_id: DeviceId::generate(),
            role: Role::default(),
            data_dir: PathBuf::from("vitrine-data"),
            advertised_ip: None,
            sync: SyncConfig::default(),
            genai: None,
        }
    }

    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }

    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_advertised_ip(mut self, ip: impl Into<String>) -> Self {
        self.advertised_ip = Some(ip.into());
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_genai(mut self, genai: GenAiConfig) -> Self {
        self.genai = Some(genai);
        self
    }

    /// Whether the relay is reached over TLS
    pub fn is_secure(&self) -> bool {
        self.relay_url.starts_with("wss://")
    }

    /// Storage rooted at `data_dir`
    pub fn storage(&self) -> Storage {
        Storage::new(&self.data_dir)
    }

    /// Content generator for the configured endpoint, if any
    pub fn generator(&self) -> ClientResult<Option<Arc<dyn ContentGenerator>>> {
        let Some(genai) = &self.genai else {
            return Ok(None);
        };
        let client: Arc<dyn ContentGenerator> = Arc::new(GeminiClient::new(genai.clone())?);
        Ok(Some(client))
    }
}
