//! Local replica of the room document

use shared::{AppState, Revision};
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

/// Suppression window opened by a remote apply
#[derive(Debug, Clone)]
pub struct EchoGuard {
    window: Duration,
    until: Option<Instant>,
}

impl EchoGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            until: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.until = Some(now + self.window);
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// When the current window closes, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        self.until
    }

    pub fn clear(&mut self) {
        self.until = None;
    }
}

/// What the worker should do after a local commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAction {
    /// Propose now
    Propose,
    /// Inside the echo window; propose when it closes
    Defer,
}

/// Replica of the shared document plus its sync bookkeeping.
///
/// Remote documents always replace the local one (last applied wins); the
/// relay's revision check is what protects concurrent edits. An ack brings
/// back the accepted proposal if a snapshot replaced it in the meantime.
#[derive(Debug, Clone)]
pub struct Replica {
    state: AppState,
    revision: Option<Revision>,
    /// Local edits the relay has not confirmed
    dirty: bool,
    /// Bumped on every local commit
    edit_seq: u64,
    /// Proposals awaiting an answer, oldest first: edit sequence and the
    /// document that was sent
    in_flight: VecDeque<(u64, AppState)>,
    guard: EchoGuard,
}

impl Replica {
    pub fn new(state: AppState, echo_window: Duration) -> Self {
        Self {
            state,
            revision: None,
            dirty: false,
            edit_seq: 0,
            in_flight: VecDeque::new(),
            guard: EchoGuard::new(echo_window),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Dirty, and the latest edit is not already awaiting an answer
    pub fn needs_proposal(&self) -> bool {
        self.dirty && self.in_flight.back().map(|(seq, _)| *seq) != Some(self.edit_seq)
    }

    pub fn guard(&self) -> &EchoGuard {
        &self.guard
    }

    /// Replace the document with a local edit
    pub fn commit_local(&mut self, state: AppState, now: Instant) -> CommitAction {
        self.state = state;
        self.dirty = true;
        self.edit_seq += 1;
        if self.guard.is_active(now) {
            CommitAction::Defer
        } else {
            CommitAction::Propose
        }
    }

    /// Record that the current document was sent; returns the base revision
    pub fn mark_proposed(&mut self) -> Option<Revision> {
        self.in_flight.push_back((self.edit_seq, self.state.clone()));
        self.revision
    }

    /// A proposal never reached the relay
    pub fn proposal_lost(&mut self) {
        self.in_flight.clear();
        self.dirty = true;
    }

    /// The relay accepted the oldest in-flight proposal.
    ///
    /// Returns the proposed document when it must replace what the replica
    /// holds: a snapshot applied while the proposal was in flight is older
    /// than the accepted revision.
    pub fn accepted(&mut self, revision: Revision) -> Option<AppState> {
        let proposal = self.in_flight.pop_front();
        if self.revision.is_some_and(|current| current >= revision) {
            // A newer document already arrived
            return None;
        }
        self.revision = Some(revision);

        let (seq, proposed) = proposal?;
        if seq != self.edit_seq {
            // A newer local edit is still unconfirmed
            return None;
        }
        self.dirty = false;
        if self.state == proposed {
            return None;
        }
        self.state = proposed.clone();
        Some(proposed)
    }

    /// The relay refused the oldest proposal as invalid. The edit stays
    /// local and dirty; the next change proposes again.
    pub fn invalid(&mut self) {
        self.in_flight.pop_front();
    }

    /// Replace the document with one from the network
    pub fn apply_remote(&mut self, state: AppState, revision: Option<Revision>, now: Instant) {
        self.state = state;
        if revision.is_some() {
            self.revision = revision;
        }
        self.dirty = false;
        self.guard.arm(now);
    }

    /// The relay refused our proposal and sent the canonical document
    pub fn rejected(&mut self, state: AppState, revision: Revision, now: Instant) {
        self.in_flight.clear();
        self.apply_remote(state, Some(revision), now);
    }

    /// Connection dropped: answers to in-flight proposals will never come
    pub fn disconnected(&mut self) {
        if !self.in_flight.is_empty() {
            self.in_flight.clear();
            self.dirty = true;
        }
    }
}
