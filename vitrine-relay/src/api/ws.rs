//! WebSocket handler for surface connections
//!
//! One task per socket. Frames from the client are handled inline; frames
//! for the client (direct replies and room fan-out) go through a per-connection
//! push channel so a single loop owns the sink.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use shared::models::DeviceId;
use shared::{Frame, RemoteCommand, RoomCode};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::hub::{ConnId, Proposal, RoomEvent, RoomHub};
use crate::state::RelayState;

/// Push channel depth per connection
const PUSH_CHANNEL_CAPACITY: usize = 64;

/// GET /ws: upgrade to WebSocket
pub async fn handle_ws(State(state): State<RelayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state.hub))
}

/// Room membership of one connection
struct Session {
    conn: ConnId,
    room: Option<RoomCode>,
    device_id: Option<DeviceId>,
    forwarder: Option<JoinHandle<()>>,
}

impl Session {
    fn new() -> Self {
        Self {
            conn: Uuid::new_v4(),
            room: None,
            device_id: None,
            forwarder: None,
        }
    }

    fn leave(&mut self, hub: &RoomHub) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
        if let Some(room) = self.room.take() {
            hub.leave(&room, self.conn);
        }
    }

    /// Room the frame may act on, if this connection has joined it
    fn joined(&self, room: &RoomCode) -> bool {
        self.room.as_ref() == Some(room)
    }
}

async fn handle_ws_connection(socket: WebSocket, hub: RoomHub) {
    let mut session = Session::new();
    tracing::info!(conn = %session.conn, "WebSocket connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (push_tx, mut push_rx) = mpsc::channel::<Frame>(PUSH_CHANNEL_CAPACITY);

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(text.as_str(), &hub, &mut session, &push_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(conn = %session.conn, "WebSocket disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(conn = %session.conn, "WebSocket error: {e}");
                        break;
                    }
                    _ => {} // Binary, Ping, Pong: ignore (tungstenite answers pings)
                }
            }
            Some(frame) = push_rx.recv() => {
                let json = match frame.to_text() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(conn = %session.conn, "Failed to serialize frame: {e}");
                        continue;
                    }
                };
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    tracing::info!(conn = %session.conn, "Send failed, closing");
                    break;
                }
            }
        }
    }

    session.leave(&hub);
}

async fn handle_client_frame(
    text: &str,
    hub: &RoomHub,
    session: &mut Session,
    push_tx: &mpsc::Sender<Frame>,
) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(conn = %session.conn, "Dropping malformed frame: {e}");
            return;
        }
    };

    match frame {
        Frame::Join {
            room,
            device_id,
            revision,
        } => {
            session.leave(hub);
            let joined = hub.join(&room, session.conn, revision);
            if let Some(snapshot) = joined.snapshot {
                let _ = push_tx.send(snapshot).await;
            }
            session.forwarder = Some(spawn_forwarder(
                hub.clone(),
                room.clone(),
                session.conn,
                joined.events,
                push_tx.clone(),
            ));
            session.room = Some(room);
            session.device_id = device_id;
        }

        Frame::UpdateState {
            room,
            payload,
            base_revision,
            sender_id,
            ..
        } => {
            if !session.joined(&room) {
                tracing::debug!(conn = %session.conn, room = %room, "UPDATE_STATE outside joined room dropped");
                return;
            }
            let sender = sender_id.or_else(|| session.device_id.clone());
            let outcome = hub.propose(&room, session.conn, sender, *payload, base_revision);
            reply(&outcome, &room, push_tx).await;
        }

        Frame::RemoteCommand {
            room,
            sender_id,
            command,
        } => {
            if !session.joined(&room) {
                tracing::debug!(conn = %session.conn, room = %room, "REMOTE_COMMAND outside joined room dropped");
                return;
            }
            match command {
                RemoteCommand::ForcePush(state) => {
                    tracing::info!(room = %room, sender = %sender_id, "Force push");
                    let outcome = hub.force(&room, session.conn, Some(sender_id), *state);
                    reply(&outcome, &room, push_tx).await;
                }
                command @ (RemoteCommand::SwitchMode { .. }
                | RemoteCommand::Presence { .. }
                | RemoteCommand::RequestPresence
                | RemoteCommand::Highlight { .. }) => {
                    let name = command.name();
                    let delivered =
                        hub.forward(&room, session.conn, Frame::command(room.clone(), sender_id, command));
                    tracing::debug!(room = %room, command = name, delivered, "Command forwarded");
                }
            }
        }

        Frame::StateAccepted { .. } | Frame::StateRejected { .. } | Frame::StateInvalid { .. } => {
            tracing::debug!(conn = %session.conn, kind = frame.kind(), "Relay-only frame from client dropped");
        }
    }
}

async fn reply(outcome: &Proposal, room: &RoomCode, push_tx: &mpsc::Sender<Frame>) {
    let _ = push_tx.send(outcome.reply(room)).await;
}

/// Pump room fan-out into the connection's push channel, skipping its own frames
fn spawn_forwarder(
    hub: RoomHub,
    room: RoomCode,
    conn: ConnId,
    mut events: broadcast::Receiver<RoomEvent>,
    push_tx: mpsc::Sender<Frame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.origin == conn => continue,
                Ok(event) => {
                    if push_tx.send(event.frame.as_ref().clone()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Missed frames; the latest document supersedes them
                    tracing::warn!(room = %room, conn = %conn, skipped, "Member lagged, resyncing");
                    if let Some(snapshot) = hub.committed_frame(&room)
                        && push_tx.send(snapshot).await.is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
