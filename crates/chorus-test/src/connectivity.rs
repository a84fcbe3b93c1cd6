//! Fake connectivity sessions
//!
//! Scripted WebRTC-equivalent sessions: offers and answers are synthetic
//! SDP strings, local candidates are emitted when a local description is
//! set, and the transport reports connected once both descriptions exist.
//! Probes expose everything a session was driven through so scenarios can
//! assert on description counts, candidate order, audio attachment, and
//! close-before-drop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use chorus_core::{
    AudioSourceHandle, IceCandidate, LinkEvent, LinkId, MeshError, MeshResult, ParticipantId, Sdp,
    SessionSink, StreamId, TransportState,
};
use chorus_peer::{ConnectivityConfig, ConnectivityFactory, ConnectivitySession};

#[derive(Default)]
struct SessionState {
    local_descriptions: Vec<Sdp>,
    remote_descriptions: Vec<Sdp>,
    candidates: Vec<IceCandidate>,
    attached_audio: Option<AudioSourceHandle>,
    announced: bool,
    closed: bool,
}

struct SessionShared {
    link: LinkId,
    remote: ParticipantId,
    sink: SessionSink,
    state: Mutex<SessionState>,
}

/// Read-only view of one created session.
#[derive(Clone)]
pub struct SessionProbe {
    shared: Arc<SessionShared>,
}

impl SessionProbe {
    pub fn link(&self) -> LinkId {
        self.shared.link
    }

    pub fn remote(&self) -> ParticipantId {
        self.shared.remote
    }

    pub fn closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn local_description_count(&self) -> usize {
        self.shared.state.lock().local_descriptions.len()
    }

    pub fn remote_description_count(&self) -> usize {
        self.shared.state.lock().remote_descriptions.len()
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .candidates
            .iter()
            .map(|candidate| candidate.candidate.clone())
            .collect()
    }

    pub fn attached_audio(&self) -> Option<AudioSourceHandle> {
        self.shared.state.lock().attached_audio
    }
}

struct FactoryInner {
    sessions: Mutex<Vec<Arc<SessionShared>>>,
    fail_create: AtomicBool,
    fail_offer: AtomicBool,
    candidates_per_session: AtomicU64,
    next_stream: AtomicU64,
}

/// Cloneable factory handle; one per client in the scenarios.
#[derive(Clone)]
pub struct FakeConnectivityFactory {
    inner: Arc<FactoryInner>,
}

impl FakeConnectivityFactory {
    pub fn new() -> Self {
        FakeConnectivityFactory {
            inner: Arc::new(FactoryInner {
                sessions: Mutex::new(Vec::new()),
                fail_create: AtomicBool::new(false),
                fail_offer: AtomicBool::new(false),
                candidates_per_session: AtomicU64::new(1),
                next_stream: AtomicU64::new(0),
            }),
        }
    }

    pub fn fail_create(&self, fail: bool) {
        self.inner.fail_create.store(fail, Ordering::Relaxed);
    }

    pub fn fail_offer(&self, fail: bool) {
        self.inner.fail_offer.store(fail, Ordering::Relaxed);
    }

    /// How many local candidates each session discovers after its local
    /// description is set.
    pub fn set_candidates_per_session(&self, count: u64) {
        self.inner
            .candidates_per_session
            .store(count, Ordering::Relaxed);
    }

    pub fn sessions_created(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Probe of the most recent session created toward `remote`.
    pub fn probe(&self, remote: ParticipantId) -> Option<SessionProbe> {
        self.inner
            .sessions
            .lock()
            .iter()
            .rev()
            .find(|shared| shared.remote == remote)
            .map(|shared| SessionProbe {
                shared: Arc::clone(shared),
            })
    }

    /// Force a transport failure on the live session toward `remote`, as a
    /// real connectivity stack would report a lost connection.
    pub fn break_transport(&self, remote: ParticipantId) {
        let Some(shared) = self
            .inner
            .sessions
            .lock()
            .iter()
            .rev()
            .find(|shared| shared.remote == remote && !shared.state.lock().closed)
            .map(Arc::clone)
        else {
            return;
        };
        shared.sink.link(LinkEvent::TransportChanged {
            link: shared.link,
            remote: shared.remote,
            state: TransportState::Failed,
        });
    }
}

impl Default for FakeConnectivityFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// One scripted connectivity session.
pub struct FakeSession {
    shared: Arc<SessionShared>,
    factory: Arc<FactoryInner>,
}

impl FakeSession {
    /// Announce the inbound track and the connected transport once both
    /// descriptions are in place.
    fn maybe_announce(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.announced
                || state.closed
                || state.local_descriptions.is_empty()
                || state.remote_descriptions.is_empty()
            {
                return;
            }
            state.announced = true;
        }

        let stream = StreamId::new(self.factory.next_stream.fetch_add(1, Ordering::Relaxed) + 1);
        self.shared.sink.link(LinkEvent::TrackAdded {
            link: self.shared.link,
            remote: self.shared.remote,
            stream,
        });
        self.shared.sink.link(LinkEvent::TransportChanged {
            link: self.shared.link,
            remote: self.shared.remote,
            state: TransportState::Connected,
        });
    }
}

impl ConnectivitySession for FakeSession {
    async fn create_offer(&mut self) -> MeshResult<Sdp> {
        if self.factory.fail_offer.load(Ordering::Relaxed) {
            return Err(MeshError::NegotiationRejected("scripted offer failure".into()));
        }
        Ok(Sdp(format!(
            "offer:{}:{}",
            self.shared.link, self.shared.remote
        )))
    }

    async fn create_answer(&mut self) -> MeshResult<Sdp> {
        Ok(Sdp(format!(
            "answer:{}:{}",
            self.shared.link, self.shared.remote
        )))
    }

    async fn set_local_description(&mut self, sdp: Sdp) -> MeshResult<()> {
        self.shared.state.lock().local_descriptions.push(sdp);

        let count = self.factory.candidates_per_session.load(Ordering::Relaxed);
        for index in 0..count {
            self.shared.sink.link(LinkEvent::CandidateDiscovered {
                link: self.shared.link,
                remote: self.shared.remote,
                candidate: IceCandidate::new(format!("cand:{}:{}", self.shared.link, index)),
            });
        }

        self.maybe_announce();
        Ok(())
    }

    async fn set_remote_description(&mut self, sdp: Sdp) -> MeshResult<()> {
        self.shared.state.lock().remote_descriptions.push(sdp);
        self.maybe_announce();
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> MeshResult<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(MeshError::NegotiationRejected("session closed".into()));
        }
        state.candidates.push(candidate);
        Ok(())
    }

    fn attach_audio(&mut self, source: AudioSourceHandle) {
        self.shared.state.lock().attached_audio = Some(source);
    }

    fn close(&mut self) {
        self.shared.state.lock().closed = true;
    }
}

impl ConnectivityFactory for FakeConnectivityFactory {
    type Session = FakeSession;

    async fn create(
        &self,
        link: LinkId,
        remote: ParticipantId,
        _config: &ConnectivityConfig,
        sink: SessionSink,
    ) -> MeshResult<Self::Session> {
        if self.inner.fail_create.load(Ordering::Relaxed) {
            return Err(MeshError::NegotiationRejected("scripted create failure".into()));
        }
        let shared = Arc::new(SessionShared {
            link,
            remote,
            sink,
            state: Mutex::new(SessionState::default()),
        });
        self.inner.sessions.lock().push(Arc::clone(&shared));
        Ok(FakeSession {
            shared,
            factory: Arc::clone(&self.inner),
        })
    }
}
