//! Remote command payloads
//!
//! A closed command set; receivers match it exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::app_state::AppState;
use crate::models::{DeviceId, Role};
use crate::types::Timestamp;

/// 远程指令 - 设备之间互发的指令
///
/// Serialized adjacently tagged: `{"command": "HIGHLIGHT", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum RemoteCommand {
    /// Ask a node (or every node when untargeted) to switch its surface role
    SwitchMode {
        mode: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_device_id: Option<DeviceId>,
    },

    /// Presence announcement
    Presence {
        device_id: DeviceId,
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ip: Option<String>,
        /// Sender clock (Unix ms); informational only
        timestamp: Timestamp,
    },

    /// Ask every node to announce itself now
    RequestPresence,

    /// Commit a full document regardless of revision
    ForcePush(Box<AppState>),

    /// Show one promotion full-screen; `None` dismisses
    Highlight {
        #[serde(default)]
        promotion_id: Option<String>,
    },
}

impl RemoteCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SwitchMode { .. } => "SWITCH_MODE",
            Self::Presence { .. } => "PRESENCE",
            Self::RequestPresence => "REQUEST_PRESENCE",
            Self::ForcePush(_) => "FORCE_PUSH",
            Self::Highlight { .. } => "HIGHLIGHT",
        }
    }

    /// Whether a node with `device_id` should act on this switch request
    pub fn targets(&self, device_id: &DeviceId) -> bool {
        match self {
            Self::SwitchMode {
                target_device_id, ..
            } => target_device_id.as_ref().is_none_or(|t| t == device_id),
            _ => true,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
