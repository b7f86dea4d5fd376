//! 同步协议帧定义
//!
//! JSON text frames exchanged between surfaces and the relay. Every frame
//! carries its room code; receivers drop frames addressed to another room.
//!
//! ```text
//! {"type":"JOIN","room":"ABC123","deviceId":"DEV-1","revision":4}
//! {"type":"UPDATE_STATE","room":"ABC123","payload":{...},"baseRevision":4}
//! {"type":"REMOTE_COMMAND","room":"ABC123","senderId":"DEV-1","command":"HIGHLIGHT","payload":{"promotionId":"p1"}}
//! {"type":"STATE_ACCEPTED","room":"ABC123","revision":5}
//! {"type":"STATE_REJECTED","room":"ABC123","revision":5,"payload":{...}}
//! {"type":"STATE_INVALID","room":"ABC123","code":2,"message":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::{AppError, ErrorCode};
use crate::models::DeviceId;
use crate::types::RoomCode;

pub mod payload;
pub use payload::*;

/// Canonical document revision, assigned by the relay. Starts at 1.
pub type Revision = u64;

/// Wire frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Frame {
    /// Join a room. `revision` is the replica's current revision, if any.
    Join {
        room: RoomCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device_id: Option<DeviceId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<Revision>,
    },

    /// Whole-document replacement.
    ///
    /// Client → relay: a proposal based on `base_revision`.
    /// Relay → client: a committed document at `revision`.
    UpdateState {
        room: RoomCode,
        payload: Box<AppState>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<Revision>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_revision: Option<Revision>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<DeviceId>,
    },

    RemoteCommand {
        room: RoomCode,
        sender_id: DeviceId,
        #[serde(flatten)]
        command: RemoteCommand,
    },

    /// Relay → proposer: the proposal is now canonical at `revision`
    StateAccepted { room: RoomCode, revision: Revision },

    /// Relay → proposer: the proposal was stale; here is the canonical document
    StateRejected {
        room: RoomCode,
        revision: Revision,
        payload: Box<AppState>,
    },

    /// Relay → proposer: the proposal failed validation and the room has no
    /// document to offer instead
    StateInvalid {
        room: RoomCode,
        code: ErrorCode,
        message: String,
    },
}

impl Frame {
    pub fn join(room: RoomCode, device_id: DeviceId, revision: Option<Revision>) -> Self {
        Self::Join {
            room,
            device_id: Some(device_id),
            revision,
        }
    }

    /// Client proposal
    pub fn propose(
        room: RoomCode,
        sender_id: DeviceId,
        state: AppState,
        base_revision: Option<Revision>,
    ) -> Self {
        Self::UpdateState {
            room,
            payload: Box::new(state),
            revision: None,
            base_revision,
            sender_id: Some(sender_id),
        }
    }

    /// Committed document as fanned out by the relay
    pub fn committed(
        room: RoomCode,
        state: AppState,
        revision: Revision,
        sender_id: Option<DeviceId>,
    ) -> Self {
        Self::UpdateState {
            room,
            payload: Box::new(state),
            revision: Some(revision),
            base_revision: None,
            sender_id,
        }
    }

    pub fn invalid(room: RoomCode, error: &AppError) -> Self {
        Self::StateInvalid {
            room,
            code: error.code,
            message: error.message.clone(),
        }
    }

    pub fn command(room: RoomCode, sender_id: DeviceId, command: RemoteCommand) -> Self {
        Self::RemoteCommand {
            room,
            sender_id,
            command,
        }
    }

    pub fn room(&self) -> &RoomCode {
        match self {
            Self::Join { room, .. }
            | Self::UpdateState { room, .. }
            | Self::RemoteCommand { room, .. }
            | Self::StateAccepted { room, .. }
            | Self::StateRejected { room, .. }
            | Self::StateInvalid { room, .. } => room,
        }
    }

    /// Originating device, when the frame carries one
    pub fn sender(&self) -> Option<&DeviceId> {
        match self {
            Self::Join { device_id, .. } => device_id.as_ref(),
            Self::UpdateState { sender_id, .. } => sender_id.as_ref(),
            Self::RemoteCommand { sender_id, .. } => Some(sender_id),
            Self::StateAccepted { .. }
            | Self::StateRejected { .. }
            | Self::StateInvalid { .. } => None,
        }
    }

    /// Frame type name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "JOIN",
            Self::UpdateState { .. } => "UPDATE_STATE",
            Self::RemoteCommand { .. } => "REMOTE_COMMAND",
            Self::StateAccepted { .. } => "STATE_ACCEPTED",
            Self::StateRejected { .. } => "STATE_REJECTED",
            Self::StateInvalid { .. } => "STATE_INVALID",
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn room() -> RoomCode {
        RoomCode::new("ABC123").unwrap()
    }

    #[test]
    fn test_join_wire_shape() {
        let frame = Frame::join(room(), DeviceId::new("DEV-1"), None);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({"type": "JOIN", "room": "ABC123", "deviceId": "DEV-1"}));
    }

    #[test]
    fn test_minimal_join_accepted() {
        // Bare join without device id or revision
        let frame = Frame::parse(r#"{"type":"JOIN","room":"abc123"}"#).unwrap();
        assert_eq!(frame.room(), &room());
        assert!(frame.sender().is_none());
    }

    #[test]
    fn test_remote_command_flattened() {
        let frame = Frame::command(
            room(),
            DeviceId::new("DEV-2"),
            RemoteCommand::Highlight {
                promotion_id: Some("p1".into()),
            },
        );
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "REMOTE_COMMAND",
                "room": "ABC123",
                "senderId": "DEV-2",
                "command": "HIGHLIGHT",
                "payload": {"promotionId": "p1"}
            })
        );

        let back = Frame::parse(&value.to_string()).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.sender().map(|d| d.as_str()), Some("DEV-2"));
    }

    #[test]
    fn test_update_state_carries_document() {
        let mut state = AppState::sample();
        state.store_name = "NOVO AÇOUGUE".into();
        state.super_offer.add("3", Decimal::new(3990, 2));

        let frame = Frame::propose(room(), DeviceId::new("DEV-1"), state.clone(), Some(4));
        let text = frame.to_text().unwrap();
        assert!(text.contains("\"baseRevision\":4"));
        assert!(!text.contains("\"revision\""));

        match Frame::parse(&text).unwrap() {
            Frame::UpdateState { payload, .. } => assert_eq!(*payload, state),
            other => panic!("unexpected frame: {}", other.kind()),
        }
    }

    #[test]
    fn test_state_invalid_carries_error_code() {
        let err = AppError::with_message(ErrorCode::InvalidPrice, "Offer price must not be negative");
        let frame = Frame::invalid(room(), &err);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "STATE_INVALID",
                "room": "ABC123",
                "code": 6003,
                "message": "Offer price must not be negative"
            })
        );
        assert!(frame.sender().is_none());
    }

    #[test]
    fn test_malformed_frames_fail_to_parse() {
        assert!(Frame::parse("not json").is_err());
        assert!(Frame::parse(r#"{"type":"SHOUT","room":"ABC123"}"#).is_err());
        assert!(Frame::parse(r#"{"type":"JOIN","room":"bad room"}"#).is_err());
        assert!(Frame::parse(r#"{"type":"UPDATE_STATE","room":"ABC123"}"#).is_err());
    }
}
