//! Peer link state machine
//!
//! One `PeerLink` per remote participant: the negotiation state, the
//! exclusively-owned connectivity session, and the queue of remote
//! candidates that arrived before a remote description was set.

use std::collections::VecDeque;

use chorus_core::{IceCandidate, LinkId, ParticipantId};

use crate::connectivity::ConnectivitySession;

/// Which side of the negotiation this link plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkRole {
    Initiator,
    Responder,
}

impl LinkRole {
    /// Role the local participant takes toward `remote`: the lower id
    /// always dials, independent of join order.
    pub fn of(local: ParticipantId, remote: ParticipantId) -> LinkRole {
        if local.initiates_toward(remote) {
            LinkRole::Initiator
        } else {
            LinkRole::Responder
        }
    }
}

/// Negotiation state of one link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    New,
    OfferSent,
    AnswerSent,
    Connected,
    Failed,
    Closed,
}

/// One remote participant's negotiation state and connectivity session.
pub struct PeerLink<S> {
    id: LinkId,
    remote: ParticipantId,
    role: LinkRole,
    state: LinkState,
    session: S,
    /// Remote candidates buffered in arrival order until a remote
    /// description is set.
    pending_candidates: VecDeque<IceCandidate>,
    remote_description_set: bool,
}

impl<S> PeerLink<S> {
    pub fn new(id: LinkId, remote: ParticipantId, role: LinkRole, session: S) -> Self {
        PeerLink {
            id,
            remote,
            role,
            state: LinkState::New,
            session,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn remote(&self) -> ParticipantId {
        self.remote
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn set_state(&mut self, state: LinkState) {
        self.state = state;
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// Buffer a candidate that cannot be applied yet.
    pub fn queue_candidate(&mut self, candidate: IceCandidate) {
        self.pending_candidates.push_back(candidate);
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Record that a remote description is now set and drain the buffered
    /// candidates in their original arrival order.
    pub fn mark_remote_description(&mut self) -> Vec<IceCandidate> {
        self.remote_description_set = true;
        self.pending_candidates.drain(..).collect()
    }
}

impl<S: ConnectivitySession> PeerLink<S> {
    /// Release the connectivity session. Idempotent through the session's
    /// own close semantics.
    pub fn close(&mut self) {
        self.session.close();
        self.state = LinkState::Closed;
    }
}
