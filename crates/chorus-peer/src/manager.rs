//! Peer lifecycle manager
//!
//! Owns at most one `PeerLink` per remote participant and drives each
//! through offer/answer/candidate exchange. Outbound signals accumulate in
//! an internal queue drained by the session controller; inbound events are
//! validated against the link instance they were produced for, so a retired
//! link's callbacks never touch its successor.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace, warn};

use chorus_core::{
    AddressedSignal, AudioSourceHandle, IceCandidate, LinkEvent, LinkId, MeshError, MeshResult,
    ParticipantId, RemoteMediaStream, Sdp, SessionSink, SignalPayload, TransportState,
};

use crate::connectivity::{ConnectivityConfig, ConnectivityFactory, ConnectivitySession};
use crate::link::{LinkRole, LinkState, PeerLink};

/// What a handled link event means for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkUpdate {
    None,
    /// An inbound stream arrived, already tagged with its producer.
    StreamAdded(RemoteMediaStream),
    /// The link was retired; the session prunes everything tagged to it.
    Retired { remote: ParticipantId },
}

/// One negotiation state machine per remote participant.
pub struct PeerLifecycleManager<C: ConnectivityFactory> {
    local: ParticipantId,
    factory: C,
    config: ConnectivityConfig,
    links: HashMap<ParticipantId, PeerLink<C::Session>>,
    outbound: VecDeque<AddressedSignal>,
    sink: Option<SessionSink>,
    audio: Option<AudioSourceHandle>,
    next_link: u64,
}

impl<C: ConnectivityFactory> PeerLifecycleManager<C> {
    pub fn new(local: ParticipantId, factory: C, config: ConnectivityConfig) -> Self {
        PeerLifecycleManager {
            local,
            factory,
            config,
            links: HashMap::new(),
            outbound: VecDeque::new(),
            sink: None,
            audio: None,
            next_link: 0,
        }
    }

    /// Bind the manager to the current session: the sink new sessions
    /// report into and the local audio handle each leg attaches.
    pub fn bind(&mut self, sink: SessionSink, audio: Option<AudioSourceHandle>) {
        self.sink = Some(sink);
        self.audio = audio;
    }

    /// Retire every link and detach from the session.
    pub fn reset(&mut self) {
        self.retire_all();
        self.sink = None;
        self.audio = None;
    }

    /// Next outbound signal, if any.
    pub fn pop_signal(&mut self) -> Option<AddressedSignal> {
        self.outbound.pop_front()
    }

    pub fn contains(&self, remote: ParticipantId) -> bool {
        self.links.contains_key(&remote)
    }

    pub fn remotes(&self) -> Vec<ParticipantId> {
        self.links.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn link_state(&self, remote: ParticipantId) -> Option<LinkState> {
        self.links.get(&remote).map(|link| link.state())
    }

    pub fn link_role(&self, remote: ParticipantId) -> Option<LinkRole> {
        self.links.get(&remote).map(|link| link.role())
    }

    pub fn link_id(&self, remote: ParticipantId) -> Option<LinkId> {
        self.links.get(&remote).map(|link| link.id())
    }

    /// Begin offer negotiation toward `remote` if no link exists and the
    /// tie-break assigns us the dialing side. Idempotent.
    pub async fn ensure_initiated(&mut self, remote: ParticipantId) -> MeshResult<()> {
        if self.links.contains_key(&remote) {
            return Ok(());
        }
        if LinkRole::of(self.local, remote) != LinkRole::Initiator {
            debug!(%remote, "not the dialing side; waiting for the remote offer");
            return Ok(());
        }

        let link_id = self.next_link_id();
        let mut session = self.open_session(link_id, remote).await?;
        let offer = match Self::start_offer(&mut session).await {
            Ok(offer) => offer,
            Err(error) => {
                session.close();
                return Err(error);
            }
        };

        let mut link = PeerLink::new(link_id, remote, LinkRole::Initiator, session);
        link.set_state(LinkState::OfferSent);
        self.links.insert(remote, link);
        self.outbound.push_back(AddressedSignal {
            to: remote,
            payload: SignalPayload::Offer { sdp: offer },
        });
        debug!(%remote, link = %link_id, "offer negotiation started");
        Ok(())
    }

    /// Apply a remote offer: create a responder link if none exists, then
    /// set the remote description, answer, and replay buffered candidates.
    ///
    /// An offer against a link that already settled re-answers without
    /// regressing its state - that is what lets a dialer reconnect through
    /// a fresh offer after a one-sided transport failure.
    pub async fn handle_remote_offer(&mut self, remote: ParticipantId, sdp: Sdp) -> MeshResult<()> {
        if LinkRole::of(self.local, remote) != LinkRole::Responder {
            return Err(MeshError::NegotiationRejected(format!(
                "offer from {remote}, but the lower id dials"
            )));
        }

        let created = if self.links.contains_key(&remote) {
            false
        } else {
            let link_id = self.next_link_id();
            let session = self.open_session(link_id, remote).await?;
            self.links
                .insert(remote, PeerLink::new(link_id, remote, LinkRole::Responder, session));
            debug!(%remote, link = %link_id, "responder link created");
            true
        };

        match self.answer_offer(remote, sdp).await {
            Ok(()) => Ok(()),
            Err(error) => {
                // A failed first offer unwinds to "no link"; a failed
                // re-offer leaves the surviving link in its prior state.
                if created {
                    self.retire(remote);
                }
                Err(error)
            }
        }
    }

    /// Apply a remote answer. Only an initiator still waiting on its offer
    /// accepts one; duplicate or late answers are ignored so a settled link
    /// is never renegotiated from behind.
    pub async fn handle_remote_answer(&mut self, remote: ParticipantId, sdp: Sdp) -> MeshResult<()> {
        let Some(link) = self.links.get_mut(&remote) else {
            debug!(%remote, "answer for unknown peer ignored");
            return Ok(());
        };
        if link.role() != LinkRole::Initiator || link.state() != LinkState::OfferSent {
            debug!(%remote, state = ?link.state(), "answer ignored: negotiation already settled");
            return Ok(());
        }

        link.session_mut().set_remote_description(sdp).await?;
        Self::replay_candidates(link, remote).await;
        link.set_state(LinkState::Connected);
        debug!(%remote, "negotiation settled");
        Ok(())
    }

    /// Apply a remote candidate immediately if a remote description is set,
    /// otherwise buffer it in arrival order.
    pub async fn handle_remote_candidate(
        &mut self,
        remote: ParticipantId,
        candidate: IceCandidate,
    ) -> MeshResult<()> {
        let Some(link) = self.links.get_mut(&remote) else {
            debug!(%remote, "candidate for unknown peer dropped");
            return Ok(());
        };

        if link.remote_description_set() {
            link.session_mut().add_ice_candidate(candidate).await?;
        } else {
            link.queue_candidate(candidate);
            trace!(%remote, pending = link.pending_candidates(), "candidate buffered");
        }
        Ok(())
    }

    /// Apply a connectivity session report. Events from a retired link
    /// generation are no-ops.
    pub fn handle_link_event(&mut self, event: LinkEvent) -> LinkUpdate {
        let remote = event.remote();
        let Some(link) = self.links.get_mut(&remote) else {
            trace!(%remote, "event for retired peer ignored");
            return LinkUpdate::None;
        };
        if link.id() != event.link() {
            trace!(%remote, link = %event.link(), "event from a previous link generation ignored");
            return LinkUpdate::None;
        }

        match event {
            LinkEvent::CandidateDiscovered { candidate, .. } => {
                self.outbound.push_back(AddressedSignal {
                    to: remote,
                    payload: SignalPayload::Candidate { candidate },
                });
                LinkUpdate::None
            }
            LinkEvent::TrackAdded { stream, .. } => LinkUpdate::StreamAdded(RemoteMediaStream {
                id: stream,
                source: remote,
            }),
            LinkEvent::TransportChanged { state, .. } => match state {
                TransportState::Connected => {
                    if matches!(link.state(), LinkState::OfferSent | LinkState::AnswerSent) {
                        link.set_state(LinkState::Connected);
                        debug!(%remote, "transport connected");
                    }
                    LinkUpdate::None
                }
                state if state.is_terminal() => {
                    link.set_state(LinkState::Failed);
                    warn!(
                        error = %MeshError::PeerUnreachable(remote),
                        ?state,
                        "transport lost; retiring peer link"
                    );
                    self.retire(remote);
                    LinkUpdate::Retired { remote }
                }
                _ => LinkUpdate::None,
            },
        }
    }

    /// Close and remove the link for `remote`. Idempotent; safe to call
    /// mid-negotiation.
    pub fn retire(&mut self, remote: ParticipantId) -> bool {
        match self.links.remove(&remote) {
            Some(mut link) => {
                link.close();
                debug!(%remote, link = %link.id(), "peer link retired");
                true
            }
            None => false,
        }
    }

    /// Retire every link.
    pub fn retire_all(&mut self) {
        for (_, mut link) in self.links.drain() {
            link.close();
        }
        self.outbound.clear();
    }

    async fn answer_offer(&mut self, remote: ParticipantId, sdp: Sdp) -> MeshResult<()> {
        let Some(link) = self.links.get_mut(&remote) else {
            return Ok(());
        };

        link.session_mut().set_remote_description(sdp).await?;
        let answer = link.session_mut().create_answer().await?;
        link.session_mut().set_local_description(answer.clone()).await?;
        if link.state() == LinkState::New {
            link.set_state(LinkState::AnswerSent);
        }
        self.outbound.push_back(AddressedSignal {
            to: remote,
            payload: SignalPayload::Answer { sdp: answer },
        });
        Self::replay_candidates(link, remote).await;
        Ok(())
    }

    /// Drain candidates buffered before the remote description existed and
    /// apply them in their original arrival order. A rejected candidate is
    /// dropped without disturbing the rest.
    async fn replay_candidates(link: &mut PeerLink<C::Session>, remote: ParticipantId) {
        for candidate in link.mark_remote_description() {
            if let Err(error) = link.session_mut().add_ice_candidate(candidate).await {
                warn!(%remote, %error, "buffered candidate rejected");
            }
        }
    }

    async fn start_offer(session: &mut C::Session) -> MeshResult<Sdp> {
        let offer = session.create_offer().await?;
        session.set_local_description(offer.clone()).await?;
        Ok(offer)
    }

    async fn open_session(&mut self, link: LinkId, remote: ParticipantId) -> MeshResult<C::Session> {
        let Some(sink) = self.sink.clone() else {
            return Err(MeshError::NegotiationRejected(
                "no active session to negotiate under".to_string(),
            ));
        };

        let mut session = self.factory.create(link, remote, &self.config, sink).await?;
        if let Some(audio) = self.audio {
            session.attach_audio(audio);
        }
        Ok(session)
    }

    fn next_link_id(&mut self) -> LinkId {
        self.next_link += 1;
        LinkId::new(self.next_link)
    }
}
