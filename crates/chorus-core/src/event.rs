//! Session events
//!
//! Every collaborator callback - membership change notifications, inbound
//! relay envelopes, connectivity session reports - becomes a message on one
//! bounded queue consumed by the session controller. That keeps the core
//! single-threaded and makes event interleaving explicit instead of
//! implicit in callback timing.

use tokio::sync::mpsc;
use tracing::warn;

use crate::id::{ChannelId, LinkId, ParticipantId, SessionGeneration, StreamId};
use crate::signal::{IceCandidate, SignalEnvelope};

/// Connection state reported by a connectivity session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// States that end the link and trigger automatic retirement.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed
        )
    }
}

/// A report from one connectivity session, keyed by the link instance that
/// produced it so reports from a retired predecessor can be discarded.
#[derive(Clone, Debug)]
pub enum LinkEvent {
    CandidateDiscovered {
        link: LinkId,
        remote: ParticipantId,
        candidate: IceCandidate,
    },
    TrackAdded {
        link: LinkId,
        remote: ParticipantId,
        stream: StreamId,
    },
    TransportChanged {
        link: LinkId,
        remote: ParticipantId,
        state: TransportState,
    },
}

impl LinkEvent {
    pub fn link(&self) -> LinkId {
        match self {
            LinkEvent::CandidateDiscovered { link, .. }
            | LinkEvent::TrackAdded { link, .. }
            | LinkEvent::TransportChanged { link, .. } => *link,
        }
    }

    pub fn remote(&self) -> ParticipantId {
        match self {
            LinkEvent::CandidateDiscovered { remote, .. }
            | LinkEvent::TrackAdded { remote, .. }
            | LinkEvent::TransportChanged { remote, .. } => *remote,
        }
    }
}

/// One message on the session queue, stamped with the generation of the
/// sink that produced it.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// The membership store signaled "something changed" for the channel.
    MembershipChanged {
        generation: SessionGeneration,
        channel: ChannelId,
    },
    /// An envelope observed on the signaling topic.
    Signal {
        generation: SessionGeneration,
        envelope: SignalEnvelope,
    },
    /// A connectivity session report.
    Link {
        generation: SessionGeneration,
        event: LinkEvent,
    },
}

impl SessionEvent {
    pub fn generation(&self) -> SessionGeneration {
        match self {
            SessionEvent::MembershipChanged { generation, .. }
            | SessionEvent::Signal { generation, .. }
            | SessionEvent::Link { generation, .. } => *generation,
        }
    }
}

/// The write side of the session queue, handed to collaborators on
/// subscription.
///
/// Cloneable and cheap; every event it produces carries the generation the
/// sink was created under. Sends never block: if the queue is full the
/// event is dropped with a warning, mirroring the bounded ingest buffers of
/// the runtime.
#[derive(Clone, Debug)]
pub struct SessionSink {
    tx: mpsc::Sender<SessionEvent>,
    generation: SessionGeneration,
}

impl SessionSink {
    pub fn new(tx: mpsc::Sender<SessionEvent>, generation: SessionGeneration) -> Self {
        SessionSink { tx, generation }
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub fn membership_changed(&self, channel: ChannelId) {
        self.push(SessionEvent::MembershipChanged {
            generation: self.generation,
            channel,
        });
    }

    pub fn signal(&self, envelope: SignalEnvelope) {
        self.push(SessionEvent::Signal {
            generation: self.generation,
            envelope,
        });
    }

    pub fn link(&self, event: LinkEvent) {
        self.push(SessionEvent::Link {
            generation: self.generation,
            event,
        });
    }

    fn push(&self, event: SessionEvent) {
        if self.tx.try_send(event).is_err() {
            warn!(generation = %self.generation, "session queue full or closed; event dropped");
        }
    }
}
