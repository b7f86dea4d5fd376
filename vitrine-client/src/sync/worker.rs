//! SyncWorker: owns the relay connection
//!
//! 1. Connect, JOIN the room, announce presence
//! 2. Re-propose local edits the relay never confirmed
//! 3. Select over inbound frames, handle requests and timers
//! 4. Reconnect with jittered exponential backoff on disconnect
//!
//! Every document change is persisted from here, on the blocking pool.

use futures::{SinkExt, StreamExt};
use shared::models::Role;
use shared::util::now_millis;
use shared::{AppState, Frame, RemoteCommand, Timestamp};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::{CommitAction, Outgoing, Shared, SyncEvent};
use crate::error::{ClientError, ClientResult};
use crate::message::{
    Backoff, Connection, ConnectionStatus, Connector, Outbound, SyncConfig, transport::FrameSink,
};
use crate::storage::Storage;

/// Far-future placeholder for disabled timers
const IDLE: Duration = Duration::from_secs(3600);

pub(super) struct SyncWorker {
    shared: Arc<Shared>,
    config: SyncConfig,
    connector: Arc<dyn Connector>,
    storage: Storage,
    outgoing: mpsc::Receiver<Outgoing>,
    shutdown: CancellationToken,
    backoff: Backoff,
    /// A local commit landed inside the echo window
    flush_pending: bool,
    /// Wall clock anchored to the runtime clock at start; roster times use it
    epoch: Instant,
    epoch_ms: Timestamp,
}

/// Why a session ended
enum SessionEnd {
    Disconnected,
    Shutdown,
}

impl SyncWorker {
    pub(super) fn new(
        shared: Arc<Shared>,
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        storage: Storage,
        outgoing: mpsc::Receiver<Outgoing>,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(&config);
        Self {
            shared,
            config,
            connector,
            storage,
            outgoing,
            shutdown,
            backoff,
            flush_pending: false,
            epoch: Instant::now(),
            epoch_ms: now_millis(),
        }
    }

    /// Main run loop: connect, run a session, back off, repeat
    pub(super) async fn run(mut self) {
        tracing::debug!(room = %self.shared.room, "SyncWorker started");

        loop {
            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(conn) => {
                    self.backoff.reset();
                    let end = self.run_session(conn).await;
                    self.shared.replica.lock().disconnected();
                    if matches!(end, SessionEnd::Shutdown) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt = self.backoff.attempt() + 1, "Relay connection failed: {e}");
                }
            }

            let delay = self.backoff.next_delay();
            let attempt = self.backoff.attempt();
            let status = if self.backoff.exhausted() {
                ConnectionStatus::Offline { attempt }
            } else {
                ConnectionStatus::Degraded {
                    attempt,
                    retry_in: delay,
                }
            };
            self.set_status(status);
            tracing::info!(delay_ms = delay.as_millis() as u64, %status, "Reconnecting to relay");

            if !self.wait_offline(delay).await {
                break;
            }
        }

        self.persist().await;
        tracing::info!(room = %self.shared.room, "SyncWorker stopped");
    }

    /// Sleep before the next attempt while still serving handle requests.
    /// Returns false on shutdown.
    async fn wait_offline(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep_until(deadline) => return true,
                out = self.outgoing.recv() => match out {
                    Some(out) => self.handle_offline(out).await,
                    None => return false,
                },
            }
        }
    }

    /// Requests made while disconnected: edits stay dirty, commands are lost
    async fn handle_offline(&mut self, out: Outgoing) {
        match out {
            Outgoing::Commit(_) => self.persist().await,
            Outgoing::ForcePush => {
                self.shared.replica.lock().proposal_lost();
                self.persist().await;
                tracing::warn!("Force push dropped while offline; edit kept for next join");
            }
            Outgoing::Command(cmd) => {
                tracing::debug!(command = %cmd, "Dropping command while offline");
            }
        }
    }

    /// Run a single session until disconnect or shutdown
    async fn run_session(&mut self, conn: Connection) -> SessionEnd {
        let Connection {
            mut sink,
            mut stream,
        } = conn;

        if let Err(e) = self.open_session(&mut sink).await {
            tracing::warn!("Join failed: {e}");
            return SessionEnd::Disconnected;
        }
        self.set_status(ConnectionStatus::Online);
        tracing::info!(room = %self.shared.room, "Joined room");

        let mut presence = interval_after(self.config.presence_interval);
        let mut sweep = interval_after(self.config.sweep_interval);
        let mut ping = interval_after(self.config.heartbeat_interval);
        let heartbeat = !self.config.heartbeat_interval.is_zero();

        loop {
            let flush_at = self
                .shared
                .replica
                .lock()
                .guard()
                .deadline()
                .unwrap_or_else(|| Instant::now() + IDLE);

            let result = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }

                out = self.outgoing.recv() => match out {
                    Some(out) => self.handle_outgoing(out, &mut sink).await,
                    None => return SessionEnd::Shutdown,
                },

                msg = stream.next() => match msg {
                    Some(Ok(text)) => self.handle_text(&text, &mut sink).await,
                    Some(Err(e)) => {
                        tracing::warn!("Relay connection error: {e}");
                        return SessionEnd::Disconnected;
                    }
                    None => {
                        tracing::info!("Relay closed the connection");
                        return SessionEnd::Disconnected;
                    }
                },

                // Echo window closed → flush the deferred edit
                _ = tokio::time::sleep_until(flush_at), if self.flush_pending => {
                    self.flush_pending = false;
                    self.propose(&mut sink).await
                }

                _ = presence.tick() => self.announce(&mut sink).await,

                _ = sweep.tick() => {
                    self.sweep_roster();
                    Ok(())
                }

                _ = ping.tick(), if heartbeat => {
                    sink.send(Outbound::Ping).await
                }
            };

            if let Err(e) = result {
                tracing::warn!("Relay send failed, disconnecting: {e}");
                return SessionEnd::Disconnected;
            }
        }
    }

    /// JOIN, announce, then catch the relay up on unconfirmed edits
    async fn open_session(&mut self, sink: &mut FrameSink) -> ClientResult<()> {
        let revision = self.shared.replica.lock().revision();
        let join = Frame::join(
            self.shared.room.clone(),
            self.shared.device_id.clone(),
            revision,
        );
        send_frame(sink, &join).await?;

        self.announce(sink).await?;
        if self.role().tracks_roster() {
            self.send_command(sink, RemoteCommand::RequestPresence)
                .await?;
        }
        self.propose(sink).await
    }

    async fn handle_outgoing(&mut self, out: Outgoing, sink: &mut FrameSink) -> ClientResult<()> {
        match out {
            Outgoing::Commit(action) => {
                self.persist().await;
                let deferred = action == CommitAction::Defer
                    || self.shared.replica.lock().guard().is_active(Instant::now());
                if deferred {
                    tracing::debug!("Local edit inside echo window, deferring");
                    self.flush_pending = true;
                    Ok(())
                } else {
                    self.propose(sink).await
                }
            }
            Outgoing::ForcePush => {
                let state = {
                    let mut replica = self.shared.replica.lock();
                    replica.mark_proposed();
                    replica.state().clone()
                };
                tracing::info!("Force pushing local document");
                self.send_command(sink, RemoteCommand::ForcePush(Box::new(state)))
                    .await
            }
            Outgoing::Command(cmd) => self.send_command(sink, cmd).await,
        }
    }

    /// Propose the local document when it has unconfirmed edits
    async fn propose(&mut self, sink: &mut FrameSink) -> ClientResult<()> {
        let frame = {
            let mut replica = self.shared.replica.lock();
            if !replica.needs_proposal() {
                return Ok(());
            }
            let base = replica.mark_proposed();
            Frame::propose(
                self.shared.room.clone(),
                self.shared.device_id.clone(),
                replica.state().clone(),
                base,
            )
        };
        let result = send_frame(sink, &frame).await;
        if result.is_err() {
            self.shared.replica.lock().proposal_lost();
        }
        result
    }

    /// Handle one inbound text frame
    async fn handle_text(&mut self, text: &str, sink: &mut FrameSink) -> ClientResult<()> {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("Dropping malformed frame: {e}");
                return Ok(());
            }
        };
        if frame.room() != &self.shared.room {
            tracing::debug!(room = %frame.room(), "Dropping frame for another room");
            return Ok(());
        }
        if frame.sender() == Some(&self.shared.device_id) {
            return Ok(());
        }

        match frame {
            Frame::UpdateState {
                payload, revision, ..
            } => {
                self.apply_remote(*payload, revision).await;
                self.shared.emit(SyncEvent::StateReplaced { revision });
            }
            Frame::StateAccepted { revision, .. } => {
                let restored = self.shared.replica.lock().accepted(revision);
                tracing::debug!(revision, "Proposal accepted");
                if let Some(state) = restored {
                    tracing::info!(revision, "Accepted proposal replaces older snapshot");
                    self.shared.publish_state(state);
                    self.persist().await;
                }
                self.shared.emit(SyncEvent::Accepted { revision });
            }
            Frame::StateRejected {
                revision, payload, ..
            } => {
                tracing::info!(revision, "Proposal rejected, adopting canonical document");
                let state = *payload;
                self.shared
                    .replica
                    .lock()
                    .rejected(state.clone(), revision, Instant::now());
                self.shared.publish_state(state);
                self.persist().await;
                self.shared.emit(SyncEvent::Rejected { revision });
            }
            Frame::StateInvalid { code, message, .. } => {
                tracing::warn!(code = %code, "Relay refused proposal as invalid: {message}");
                self.shared.replica.lock().invalid();
                self.shared.emit(SyncEvent::Invalid { code, message });
            }
            Frame::RemoteCommand {
                sender_id, command, ..
            } => {
                tracing::debug!(sender = %sender_id, command = %command, "Remote command");
                return self.handle_command(command, sink).await;
            }
            Frame::Join { .. } => {}
        }
        Ok(())
    }

    async fn handle_command(
        &mut self,
        command: RemoteCommand,
        sink: &mut FrameSink,
    ) -> ClientResult<()> {
        if !command.targets(&self.shared.device_id) {
            return Ok(());
        }
        match command {
            RemoteCommand::SwitchMode { mode, .. } => {
                *self.shared.role.lock() = mode;
                tracing::info!(role = %mode, "Switching surface role");
                self.shared.emit(SyncEvent::RoleChanged { role: mode });
                self.announce(sink).await?;
            }
            RemoteCommand::Presence {
                device_id, role, ip, ..
            } => {
                if self.role().tracks_roster() {
                    self.shared
                        .roster
                        .lock()
                        .upsert(device_id, role, ip, self.now_ms());
                    self.shared.emit(SyncEvent::RosterChanged);
                }
            }
            RemoteCommand::RequestPresence => self.announce(sink).await?,
            RemoteCommand::ForcePush(state) => self.apply_remote(*state, None).await,
            RemoteCommand::Highlight { promotion_id } => {
                self.shared.emit(SyncEvent::Highlight { promotion_id });
            }
        }
        Ok(())
    }

    async fn apply_remote(&mut self, state: AppState, revision: Option<shared::Revision>) {
        self.shared
            .replica
            .lock()
            .apply_remote(state.clone(), revision, Instant::now());
        self.shared.publish_state(state);
        self.persist().await;
    }

    async fn announce(&mut self, sink: &mut FrameSink) -> ClientResult<()> {
        let presence = RemoteCommand::Presence {
            device_id: self.shared.device_id.clone(),
            role: self.role(),
            ip: self.shared.advertised_ip.clone(),
            timestamp: now_millis(),
        };
        self.send_command(sink, presence).await
    }

    async fn send_command(&self, sink: &mut FrameSink, command: RemoteCommand) -> ClientResult<()> {
        let frame = Frame::command(
            self.shared.room.clone(),
            self.shared.device_id.clone(),
            command,
        );
        send_frame(sink, &frame).await
    }

    fn sweep_roster(&self) {
        if !self.role().tracks_roster() {
            return;
        }
        let offline_after = self.config.offline_after.as_millis() as i64;
        let changed = self
            .shared
            .roster
            .lock()
            .sweep(self.now_ms(), offline_after);
        if changed > 0 {
            tracing::info!(changed, "Devices went offline");
            self.shared.emit(SyncEvent::RosterChanged);
        }
    }

    /// Local receipt time in Unix ms
    fn now_ms(&self) -> Timestamp {
        self.epoch_ms + self.epoch.elapsed().as_millis() as Timestamp
    }

    fn role(&self) -> Role {
        *self.shared.role.lock()
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.shared.status_tx.send_replace(status);
    }

    async fn persist(&self) {
        let state = self.shared.replica.lock().state().clone();
        if let Err(e) = self.storage.save_state_async(state).await {
            tracing::warn!(path = %self.storage.path().display(), "Failed to persist state: {e}");
        }
    }
}

async fn send_frame(sink: &mut FrameSink, frame: &Frame) -> ClientResult<()> {
    let text = frame.to_text().map_err(ClientError::from)?;
    sink.send(Outbound::Text(text)).await
}

/// Interval whose first tick is one period away; zero periods never tick
fn interval_after(period: Duration) -> tokio::time::Interval {
    let period = if period.is_zero() { IDLE } else { period };
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}
