//! Room synchronization
//!
//! [`SyncClient::spawn`] starts one worker task that owns the relay
//! connection. Surfaces talk to it through the cloneable [`SyncHandle`]:
//! local edits go through [`SyncHandle::update`], remote changes arrive on
//! the state watch channel and the event broadcast.

pub mod presence;
pub mod replica;
mod worker;

pub use presence::Roster;
pub use replica::{CommitAction, EchoGuard, Replica};

use parking_lot::Mutex;
use shared::error::{AppResult, ErrorCode};
use shared::models::{DeviceId, DeviceRecord, Role};
use shared::util::now_millis;
use shared::{AppState, RemoteCommand, Revision, RoomCode};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::message::{ConnectionStatus, Connector};
use crate::storage::Storage;

use worker::SyncWorker;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Something surfaces may react to
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The document was replaced from the network
    StateReplaced { revision: Option<Revision> },
    /// The relay accepted one of our proposals
    Accepted { revision: Revision },
    /// The relay refused our proposal; the canonical document was adopted
    Rejected { revision: Revision },
    /// The relay found our proposal invalid; the edit stays local
    Invalid { code: ErrorCode, message: String },
    /// A HIGHLIGHT command arrived
    Highlight { promotion_id: Option<String> },
    /// This node was asked to run as another surface
    RoleChanged { role: Role },
    /// Roster entries were added or changed status
    RosterChanged,
}

/// Requests from handles to the worker
#[derive(Debug)]
enum Outgoing {
    Commit(CommitAction),
    ForcePush,
    Command(RemoteCommand),
}

/// State shared between the worker and every handle
struct Shared {
    room: RoomCode,
    device_id: DeviceId,
    advertised_ip: Option<String>,
    replica: Mutex<Replica>,
    roster: Mutex<Roster>,
    role: Mutex<Role>,
    state_tx: watch::Sender<AppState>,
    status_tx: watch::Sender<ConnectionStatus>,
    events: broadcast::Sender<SyncEvent>,
}

impl Shared {
    fn publish_state(&self, state: AppState) {
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Entry point for the sync layer
pub struct SyncClient;

impl SyncClient {
    /// Load the stored document and start the worker
    pub fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        storage: Storage,
    ) -> SyncHandle {
        let state = storage.load_state();
        let (state_tx, _) = watch::channel(state.clone());
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(config.sync.outbound_capacity.max(1));

        let shared = Arc::new(Shared {
            room: config.room.clone(),
            device_id: config.device_id.clone(),
            advertised_ip: config.advertised_ip.clone(),
            replica: Mutex::new(Replica::new(state, config.sync.echo_window)),
            roster: Mutex::new(Roster::new()),
            role: Mutex::new(config.role),
            state_tx,
            status_tx,
            events,
        });

        let shutdown = CancellationToken::new();
        let worker = SyncWorker::new(
            shared.clone(),
            config.sync.clone(),
            connector,
            storage,
            outgoing_rx,
            shutdown.clone(),
        );
        let task = tokio::spawn(worker.run());

        tracing::info!(
            room = %config.room,
            device_id = %config.device_id,
            role = %config.role,
            relay = %config.relay_url,
            "Sync client started"
        );

        SyncHandle {
            shared,
            outgoing: outgoing_tx,
            shutdown,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Cloneable handle to a running sync worker
#[derive(Clone)]
pub struct SyncHandle {
    shared: Arc<Shared>,
    outgoing: mpsc::Sender<Outgoing>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("room", &self.shared.room)
            .field("device_id", &self.shared.device_id)
            .finish()
    }
}

impl SyncHandle {
    /// Apply a local edit and broadcast the resulting document.
    ///
    /// The closure works on a copy; when it fails, or the result does not
    /// validate, nothing changes.
    pub async fn update<F, T>(&self, edit: F) -> ClientResult<T>
    where
        F: FnOnce(&mut AppState) -> AppResult<T>,
    {
        let (value, action) = {
            let mut replica = self.shared.replica.lock();
            let mut next = replica.state().clone();
            let value = edit(&mut next)?;
            next.validate()?;
            let action = replica.commit_local(next.clone(), Instant::now());
            self.shared.publish_state(next);
            (value, action)
        };
        self.send(Outgoing::Commit(action)).await?;
        Ok(value)
    }

    /// Commit the local document on the relay regardless of revision
    pub async fn force_push(&self) -> ClientResult<()> {
        self.send(Outgoing::ForcePush).await
    }

    /// Broadcast a command to the rest of the room
    pub async fn send_command(&self, command: RemoteCommand) -> ClientResult<()> {
        self.send(Outgoing::Command(command)).await
    }

    /// Ask displays to show one promotion; `None` dismisses
    pub async fn highlight(&self, promotion_id: Option<String>) -> ClientResult<()> {
        self.send_command(RemoteCommand::Highlight { promotion_id })
            .await
    }

    /// Ask `target` (every node when `None`) to run as `mode`
    pub async fn switch_mode(&self, target: Option<DeviceId>, mode: Role) -> ClientResult<()> {
        if target.as_ref() == Some(&self.shared.device_id) {
            self.set_role(mode);
            return Ok(());
        }
        self.send_command(RemoteCommand::SwitchMode {
            mode,
            target_device_id: target,
        })
        .await
    }

    /// Change this node's role locally and announce it
    pub fn set_role(&self, role: Role) {
        *self.shared.role.lock() = role;
        self.shared.emit(SyncEvent::RoleChanged { role });
        let presence = RemoteCommand::Presence {
            device_id: self.shared.device_id.clone(),
            role,
            ip: self.shared.advertised_ip.clone(),
            timestamp: now_millis(),
        };
        if self.outgoing.try_send(Outgoing::Command(presence)).is_err() {
            tracing::debug!("Presence after role change not queued");
        }
    }

    pub fn state(&self) -> AppState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AppState> {
        self.shared.state_tx.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// Current roster, sorted by device id
    pub fn roster(&self) -> Vec<DeviceRecord> {
        self.shared.roster.lock().entries().to_vec()
    }

    pub fn role(&self) -> Role {
        *self.shared.role.lock()
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.shared.device_id
    }

    pub fn room(&self) -> &RoomCode {
        &self.shared.room
    }

    /// Last canonical revision this replica knows about
    pub fn revision(&self) -> Option<Revision> {
        self.shared.replica.lock().revision()
    }

    /// Whether local edits still wait for the relay
    pub fn is_dirty(&self) -> bool {
        self.shared.replica.lock().is_dirty()
    }

    /// Stop the worker and wait for it to persist and close
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!("Sync worker panicked: {e}");
        }
    }

    async fn send(&self, out: Outgoing) -> ClientResult<()> {
        self.outgoing
            .send(out)
            .await
            .map_err(|_| ClientError::Closed)
    }
}
