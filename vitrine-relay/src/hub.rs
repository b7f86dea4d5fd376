//! RoomHub - 按房间隔离的权威状态与广播
//!
//! Owns the canonical document of every room and fans frames out to the
//! room's members.
//!
//! ```text
//! WS handler (per connection)
//!       │ JOIN / UPDATE_STATE / REMOTE_COMMAND
//!       ▼
//! RoomHub
//!   └── rooms: RoomCode → Room
//!         ├── members: connection ids
//!         ├── canonical: revision + document + last writer
//!         └── broadcast: Sender<RoomEvent> (fan-out, origin filtered by receivers)
//! ```

use dashmap::DashMap;
use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use shared::models::DeviceId;
use shared::{AppState, Frame, Revision, RoomCode};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::DEFAULT_ROOM_CHANNEL_CAPACITY;

/// Connection identifier, one per WebSocket
pub type ConnId = Uuid;

/// Frame fanned out to a room
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// Connection the frame came from; it does not get its own frame back
    pub origin: ConnId,
    pub frame: Arc<Frame>,
}

/// Committed document of a room
#[derive(Debug, Clone)]
struct Canonical {
    revision: Revision,
    state: AppState,
    last_writer: Option<DeviceId>,
    /// Connection the last writer committed through
    writer_conn: ConnId,
}

struct Room {
    members: HashSet<ConnId>,
    canonical: Option<Canonical>,
    tx: broadcast::Sender<RoomEvent>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            members: HashSet::new(),
            canonical: None,
            tx,
        }
    }

    /// Snapshot for joiners and lagged members. Carries no sender so the
    /// last writer's own replica applies it too.
    fn committed_frame(&self, room: &RoomCode) -> Option<Frame> {
        self.canonical
            .as_ref()
            .map(|c| Frame::committed(room.clone(), c.state.clone(), c.revision, None))
    }

    fn is_disposable(&self) -> bool {
        self.members.is_empty() && self.canonical.is_none()
    }
}

/// Result of joining a room
pub struct Joined {
    pub events: broadcast::Receiver<RoomEvent>,
    /// Canonical document for the joiner, when it is behind or ahead
    pub snapshot: Option<Frame>,
}

/// Outcome of a state proposal
#[derive(Debug, Clone)]
pub enum Proposal {
    /// Committed; the rest of the room has been sent the new document
    Accepted { revision: Revision },
    /// Based on an outdated revision; the canonical document is attached
    Stale {
        revision: Revision,
        state: Box<AppState>,
    },
    /// Failed validation. Carries the canonical document when there is one.
    Invalid {
        error: AppError,
        canonical: Option<(Revision, Box<AppState>)>,
    },
}

impl Proposal {
    /// Reply frame for the proposer
    pub fn reply(&self, room: &RoomCode) -> Frame {
        match self {
            Self::Accepted { revision } => Frame::StateAccepted {
                room: room.clone(),
                revision: *revision,
            },
            Self::Stale { revision, state }
            | Self::Invalid {
                canonical: Some((revision, state)),
                ..
            } => Frame::StateRejected {
                room: room.clone(),
                revision: *revision,
                payload: state.clone(),
            },
            Self::Invalid {
                error,
                canonical: None,
            } => Frame::invalid(room.clone(), error),
        }
    }
}

/// HTTP view of a room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: RoomCode,
    pub revision: Revision,
    pub members: usize,
    pub state: AppState,
}

/// 全局房间 hub
#[derive(Clone)]
pub struct RoomHub {
    rooms: Arc<DashMap<RoomCode, Room>>,
    capacity: usize,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CHANNEL_CAPACITY)
    }
}

impl RoomHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Add a connection to a room, creating the room on first join.
    ///
    /// `revision` is what the joiner already holds; the canonical document is
    /// returned only when it differs.
    pub fn join(&self, room: &RoomCode, conn: ConnId, revision: Option<Revision>) -> Joined {
        let capacity = self.capacity;
        let mut entry = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| Room::new(capacity));

        entry.members.insert(conn);
        let snapshot = match &entry.canonical {
            Some(c) if Some(c.revision) != revision => entry.committed_frame(room),
            _ => None,
        };

        tracing::info!(
            room = %room,
            conn = %conn,
            members = entry.members.len(),
            revision = ?entry.canonical.as_ref().map(|c| c.revision),
            "Member joined"
        );

        Joined {
            events: entry.tx.subscribe(),
            snapshot,
        }
    }

    /// Remove a connection; empty rooms without a document are dropped
    pub fn leave(&self, room: &RoomCode, conn: ConnId) {
        let disposable = match self.rooms.get_mut(room) {
            Some(mut entry) => {
                entry.members.remove(&conn);
                tracing::info!(room = %room, conn = %conn, members = entry.members.len(), "Member left");
                entry.is_disposable()
            }
            None => return,
        };

        if disposable {
            self.rooms.remove_if(room, |_, r| r.is_disposable());
            tracing::debug!(room = %room, "Room dropped");
        }
    }

    /// Submit a document proposal.
    ///
    /// Accepted when the room has no document yet, when `base` is the current
    /// revision, or when the proposer wrote the current revision itself over
    /// the same connection (edits chained before the first ack). A proposal
    /// without `base` never overwrites an existing document.
    pub fn propose(
        &self,
        room: &RoomCode,
        conn: ConnId,
        sender: Option<DeviceId>,
        state: AppState,
        base: Option<Revision>,
    ) -> Proposal {
        self.commit(room, conn, sender, state, base, false)
    }

    /// Commit a document regardless of revision
    pub fn force(
        &self,
        room: &RoomCode,
        conn: ConnId,
        sender: Option<DeviceId>,
        state: AppState,
    ) -> Proposal {
        self.commit(room, conn, sender, state, None, true)
    }

    fn commit(
        &self,
        room: &RoomCode,
        conn: ConnId,
        sender: Option<DeviceId>,
        state: AppState,
        base: Option<Revision>,
        force: bool,
    ) -> Proposal {
        let capacity = self.capacity;
        let mut entry = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| Room::new(capacity));

        if let Err(error) = state.validate() {
            tracing::warn!(room = %room, conn = %conn, error = %error, "Invalid proposal rejected");
            return Proposal::Invalid {
                error,
                canonical: entry
                    .canonical
                    .as_ref()
                    .map(|c| (c.revision, Box::new(c.state.clone()))),
            };
        }

        if !force
            && let Some(c) = entry.canonical.as_ref()
            && base != Some(c.revision)
            && !(base.is_some()
                && sender.is_some()
                && c.last_writer == sender
                && c.writer_conn == conn)
        {
            tracing::info!(
                room = %room,
                conn = %conn,
                base = ?base,
                current = c.revision,
                "Stale proposal rejected"
            );
            return Proposal::Stale {
                revision: c.revision,
                state: Box::new(c.state.clone()),
            };
        }

        let revision = entry.canonical.as_ref().map_or(1, |c| c.revision + 1);
        entry.canonical = Some(Canonical {
            revision,
            state: state.clone(),
            last_writer: sender.clone(),
            writer_conn: conn,
        });

        let frame = Frame::committed(room.clone(), state, revision, sender);
        let receivers = entry.tx.send(RoomEvent {
            origin: conn,
            frame: Arc::new(frame),
        });

        tracing::info!(
            room = %room,
            revision,
            forced = force,
            receivers = receivers.unwrap_or(0),
            "State committed"
        );

        Proposal::Accepted { revision }
    }

    /// Forward a frame to every other member of the room
    pub fn forward(&self, room: &RoomCode, conn: ConnId, frame: Frame) -> usize {
        match self.rooms.get(room) {
            Some(entry) => entry
                .tx
                .send(RoomEvent {
                    origin: conn,
                    frame: Arc::new(frame),
                })
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Canonical document as an `UPDATE_STATE` frame
    pub fn committed_frame(&self, room: &RoomCode) -> Option<Frame> {
        self.rooms.get(room).and_then(|r| r.committed_frame(room))
    }

    pub fn snapshot(&self, room: &RoomCode) -> Result<RoomSnapshot, AppError> {
        let entry = self
            .rooms
            .get(room)
            .ok_or_else(|| AppError::room_not_found(room.as_str()))?;
        let canonical = entry.canonical.as_ref().ok_or_else(|| {
            AppError::with_message(ErrorCode::RoomNotFound, format!("Room {room} has no state yet"))
                .with_detail("room", room.as_str())
        })?;
        Ok(RoomSnapshot {
            room: room.clone(),
            revision: canonical.revision,
            members: entry.members.len(),
            state: canonical.state.clone(),
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room: &RoomCode) -> usize {
        self.rooms.get(room).map_or(0, |r| r.members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::RemoteCommand;

    fn room() -> RoomCode {
        RoomCode::new("ABC123").unwrap()
    }

    fn dev(id: &str) -> Option<DeviceId> {
        Some(DeviceId::new(id))
    }

    fn renamed(name: &str) -> AppState {
        let mut state = AppState::sample();
        state.store_name = name.into();
        state
    }

    #[test]
    fn first_proposal_seeds_room() {
        let hub = RoomHub::default();
        let a = Uuid::new_v4();
        let joined = hub.join(&room(), a, None);
        assert!(joined.snapshot.is_none());

        let outcome = hub.propose(&room(), a, dev("A"), AppState::sample(), None);
        assert!(matches!(outcome, Proposal::Accepted { revision: 1 }));
        assert_eq!(hub.snapshot(&room()).unwrap().revision, 1);
    }

    #[test]
    fn stale_proposal_rejected_with_canonical() {
        let hub = RoomHub::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        hub.join(&room(), a, None);
        hub.join(&room(), b, None);
        hub.propose(&room(), a, dev("A"), AppState::sample(), None);

        // Both edit revision 1; A wins the race
        let first = hub.propose(&room(), a, dev("A"), renamed("A EDIT"), Some(1));
        assert!(matches!(first, Proposal::Accepted { revision: 2 }));

        let second = hub.propose(&room(), b, dev("B"), renamed("B EDIT"), Some(1));
        match &second {
            Proposal::Stale { revision, state } => {
                assert_eq!(*revision, 2);
                assert_eq!(state.store_name, "A EDIT");
            }
            other => panic!("expected stale, got {other:?}"),
        }
        assert!(matches!(
            second.reply(&room()),
            Frame::StateRejected { revision: 2, .. }
        ));
        assert_eq!(hub.snapshot(&room()).unwrap().state.store_name, "A EDIT");
    }

    #[test]
    fn last_writer_may_chain_proposals() {
        let hub = RoomHub::default();
        let a = Uuid::new_v4();
        hub.join(&room(), a, None);
        hub.propose(&room(), a, dev("A"), AppState::sample(), None);

        // A fires two edits before seeing its first ack
        assert!(matches!(
            hub.propose(&room(), a, dev("A"), renamed("ONE"), Some(1)),
            Proposal::Accepted { revision: 2 }
        ));
        assert!(matches!(
            hub.propose(&room(), a, dev("A"), renamed("TWO"), Some(1)),
            Proposal::Accepted { revision: 3 }
        ));
    }

    #[test]
    fn rejoined_writer_cannot_chain_past_its_snapshot() {
        let hub = RoomHub::default();
        let a = Uuid::new_v4();
        hub.join(&room(), a, None);
        hub.propose(&room(), a, dev("A"), AppState::sample(), None);
        hub.propose(&room(), a, dev("A"), renamed("TWO"), Some(1));

        // The ack for TWO was lost with the connection
        hub.leave(&room(), a);
        let a2 = Uuid::new_v4();
        let joined = hub.join(&room(), a2, Some(1));
        assert!(matches!(
            joined.snapshot,
            Some(Frame::UpdateState { revision: Some(2), .. })
        ));

        // Offline edit still based on revision 1
        match hub.propose(&room(), a2, dev("A"), renamed("THREE"), Some(1)) {
            Proposal::Stale { revision, state } => {
                assert_eq!(revision, 2);
                assert_eq!(state.store_name, "TWO");
            }
            other => panic!("expected stale, got {other:?}"),
        }
        assert_eq!(hub.snapshot(&room()).unwrap().revision, 2);

        // Rebased on the snapshot it goes through
        assert!(matches!(
            hub.propose(&room(), a2, dev("A"), renamed("THREE"), Some(2)),
            Proposal::Accepted { revision: 3 }
        ));
    }

    #[test]
    fn unbased_proposal_rejected_once_seeded() {
        let hub = RoomHub::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        hub.join(&room(), a, None);
        hub.propose(&room(), a, dev("A"), AppState::sample(), None);

        let outcome = hub.propose(&room(), b, dev("B"), renamed("LATE"), None);
        assert!(matches!(outcome, Proposal::Stale { revision: 1, .. }));
    }

    #[test]
    fn force_push_overrides_revision() {
        let hub = RoomHub::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        hub.join(&room(), a, None);
        hub.propose(&room(), a, dev("A"), AppState::sample(), None);
        hub.propose(&room(), a, dev("A"), renamed("X"), Some(1));

        let outcome = hub.force(&room(), b, dev("B"), renamed("FORCED"));
        assert!(matches!(outcome, Proposal::Accepted { revision: 3 }));
        assert_eq!(hub.snapshot(&room()).unwrap().state.store_name, "FORCED");
    }

    #[test]
    fn invalid_proposal_not_committed() {
        let hub = RoomHub::default();
        let a = Uuid::new_v4();
        hub.join(&room(), a, None);

        let mut bad = AppState::sample();
        bad.promo_interval_secs = 0;
        let outcome = hub.propose(&room(), a, dev("A"), bad, None);
        match &outcome {
            Proposal::Invalid { error, canonical } => {
                assert_eq!(error.code, ErrorCode::ValidationFailed);
                assert!(canonical.is_none());
            }
            other => panic!("expected invalid, got {other:?}"),
        }
        match outcome.reply(&room()) {
            Frame::StateInvalid { code, message, .. } => {
                assert_eq!(code, ErrorCode::ValidationFailed);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected reply {}", other.kind()),
        }
        assert!(hub.snapshot(&room()).is_err());
    }

    #[test]
    fn invalid_proposal_in_seeded_room_gets_canonical() {
        let hub = RoomHub::default();
        let a = Uuid::new_v4();
        hub.join(&room(), a, None);
        hub.propose(&room(), a, dev("A"), renamed("GOOD"), None);

        let mut bad = AppState::sample();
        bad.promo_interval_secs = 0;
        let outcome = hub.propose(&room(), a, dev("A"), bad, Some(1));
        assert!(matches!(
            outcome.reply(&room()),
            Frame::StateRejected { revision: 1, .. }
        ));
    }

    #[test]
    fn join_sends_snapshot_only_when_revision_differs() {
        let hub = RoomHub::default();
        let a = Uuid::new_v4();
        hub.join(&room(), a, None);
        hub.propose(&room(), a, dev("A"), AppState::sample(), None);

        let fresh = hub.join(&room(), Uuid::new_v4(), None);
        assert!(matches!(
            fresh.snapshot,
            Some(Frame::UpdateState { revision: Some(1), .. })
        ));

        let current = hub.join(&room(), Uuid::new_v4(), Some(1));
        assert!(current.snapshot.is_none());

        let ahead = hub.join(&room(), Uuid::new_v4(), Some(7));
        assert!(ahead.snapshot.is_some());
    }

    #[tokio::test]
    async fn accepted_state_fans_out_to_others() {
        let hub = RoomHub::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _ja = hub.join(&room(), a, None);
        let mut jb = hub.join(&room(), b, None);

        hub.propose(&room(), a, dev("A"), renamed("NOVO AÇOUGUE"), None);

        let event = jb.events.recv().await.unwrap();
        assert_eq!(event.origin, a);
        match event.frame.as_ref() {
            Frame::UpdateState {
                payload,
                revision,
                sender_id,
                ..
            } => {
                assert_eq!(payload.store_name, "NOVO AÇOUGUE");
                assert_eq!(*revision, Some(1));
                assert_eq!(sender_id.as_ref().map(|d| d.as_str()), Some("A"));
            }
            other => panic!("unexpected frame {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn forward_reaches_room_only() {
        let hub = RoomHub::default();
        let other_room = RoomCode::new("ZZZ999").unwrap();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        hub.join(&room(), a, None);
        let mut jb = hub.join(&room(), b, None);
        let mut jc = hub.join(&other_room, c, None);

        let frame = Frame::command(room(), DeviceId::new("A"), RemoteCommand::RequestPresence);
        assert_eq!(hub.forward(&room(), a, frame.clone()), 2);

        let event = jb.events.recv().await.unwrap();
        assert_eq!(*event.frame, frame);
        assert!(jc.events.try_recv().is_err());
    }

    #[test]
    fn empty_rooms_dropped_unless_seeded() {
        let hub = RoomHub::default();
        let other_room = RoomCode::new("TEMP").unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        hub.join(&other_room, a, None);
        assert_eq!(hub.room_count(), 1);
        hub.leave(&other_room, a);
        assert_eq!(hub.room_count(), 0);

        hub.join(&room(), b, None);
        hub.propose(&room(), b, dev("B"), AppState::sample(), None);
        hub.leave(&room(), b);
        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.member_count(&room()), 0);
        let snapshot = hub.committed_frame(&room()).unwrap();
        assert!(snapshot.sender().is_none());
    }
}
