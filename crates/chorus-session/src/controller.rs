//! Session controller
//!
//! The top-level orchestrator: owns which channel is active and the local
//! audio source, sequences join/leave, and composes the membership
//! reconciler, signaling router, and peer lifecycle manager into one
//! reactor loop.
//!
//! All collaborator callbacks arrive as messages on a single bounded queue.
//! `handle_event` is the one place state changes in reaction to the outside
//! world; `process_pending` drains the queue deterministically (which is
//! how the test harness drives multi-client scenarios) and `run` drives it
//! forever with a periodic roster-vs-links heal tick.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use chorus_core::{
    AudioConstraints, Channel, ChannelId, MeshError, MeshResult, ParticipantId, RemoteMediaStream,
    Roster, SessionEvent, SessionSink, SignalPayload,
};
use chorus_membership::{MembershipReconciler, MembershipStore};
use chorus_peer::{
    ConnectivityConfig, ConnectivityFactory, LinkRole, LinkState, LinkUpdate,
    PeerLifecycleManager,
};
use chorus_signal::{SignalingRelay, SignalingRouter};

use crate::audio::{AudioDevice, AudioSource};
use crate::local::LocalSession;

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub connectivity: ConnectivityConfig,
    /// Cadence of the periodic roster-vs-links re-evaluation in `run`.
    pub heal_interval: Duration,
    /// Capacity of the session event queue.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            connectivity: ConnectivityConfig::default(),
            heal_interval: Duration::from_secs(15),
            event_capacity: 1024,
        }
    }
}

/// Top-level session orchestrator.
pub struct SessionController<M, R, C, A>
where
    M: MembershipStore,
    R: SignalingRelay,
    C: ConnectivityFactory,
    A: AudioDevice,
{
    local: ParticipantId,
    config: SessionConfig,
    reconciler: MembershipReconciler<M>,
    router: SignalingRouter<R>,
    peers: PeerLifecycleManager<C>,
    audio: A,
    session: LocalSession<A::Source>,
    /// Inbound streams keyed by the remote that produced them, pruned on
    /// every retire path.
    streams: HashMap<ParticipantId, RemoteMediaStream>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
}

impl<M, R, C, A> SessionController<M, R, C, A>
where
    M: MembershipStore,
    R: SignalingRelay,
    C: ConnectivityFactory,
    A: AudioDevice,
{
    pub fn new(
        local: ParticipantId,
        membership: M,
        relay: R,
        connectivity: C,
        audio: A,
        config: SessionConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);
        SessionController {
            local,
            reconciler: MembershipReconciler::new(membership, local),
            router: SignalingRouter::new(relay, local),
            peers: PeerLifecycleManager::new(local, connectivity, config.connectivity.clone()),
            audio,
            session: LocalSession::new(),
            streams: HashMap::new(),
            events_tx,
            events_rx,
            config,
        }
    }

    pub fn local_participant(&self) -> ParticipantId {
        self.local
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        self.session.active_channel()
    }

    pub fn is_muted(&self) -> bool {
        self.session.muted()
    }

    /// The roster from the most recently completed re-fetch.
    pub fn roster(&self) -> &Roster {
        self.reconciler.roster()
    }

    /// The channel directory, straight from the membership store.
    pub async fn channels(&self) -> MeshResult<Vec<Channel>> {
        self.reconciler.store().list_channels().await
    }

    pub fn peer_state(&self, remote: ParticipantId) -> Option<LinkState> {
        self.peers.link_state(remote)
    }

    pub fn peer_role(&self, remote: ParticipantId) -> Option<LinkRole> {
        self.peers.link_role(remote)
    }

    pub fn connected_peers(&self) -> Vec<ParticipantId> {
        self.peers
            .remotes()
            .into_iter()
            .filter(|remote| self.peers.link_state(*remote) == Some(LinkState::Connected))
            .collect()
    }

    pub fn remote_stream(&self, remote: ParticipantId) -> Option<&RemoteMediaStream> {
        self.streams.get(&remote)
    }

    pub fn remote_streams(&self) -> impl Iterator<Item = &RemoteMediaStream> {
        self.streams.values()
    }

    /// Join a channel: acquire audio, announce presence, subscribe to
    /// signaling, then dial every member the tie-break assigns to us.
    ///
    /// Fails fast with `AlreadyInChannel` when a session is active; callers
    /// leave first. Every partial acquisition is rolled back before an
    /// error surfaces - in particular the audio source is released before
    /// `MembershipUnavailable` or `RelayUnavailable` is returned.
    pub async fn join_channel(&mut self, channel: ChannelId) -> MeshResult<Roster> {
        if let Some(active) = self.session.active_channel() {
            return Err(MeshError::AlreadyInChannel(active));
        }

        let generation = self.session.advance_generation();
        let sink = SessionSink::new(self.events_tx.clone(), generation);

        let mut source = self.audio.acquire(AudioConstraints::default()).await?;
        source.set_enabled(!self.session.muted());

        let roster = match self.reconciler.join(channel, sink.clone()).await {
            Ok(roster) => roster,
            Err(error) => {
                source.release();
                return Err(error);
            }
        };

        // Without signaling the session can never mesh, so a failed
        // subscribe is join-fatal and unwinds like a membership failure.
        if let Err(error) = self.router.attach(channel, sink.clone()).await {
            self.reconciler.leave().await;
            source.release();
            return Err(error);
        }

        self.peers.bind(sink, Some(source.handle()));
        self.session.activate(channel, source);
        info!(%channel, members = roster.len(), "joined channel");

        for remote in roster.iter() {
            if self.local.initiates_toward(remote) {
                if let Err(error) = self.peers.ensure_initiated(remote).await {
                    warn!(%remote, %error, "failed to initiate toward existing member");
                }
            }
        }
        self.flush_signals().await;

        Ok(roster)
    }

    /// Leave the active channel. Idempotent; a no-op when no channel is
    /// active. Retires every link, prunes every tagged stream, retracts
    /// presence best-effort, releases the audio source, and bumps the
    /// generation so in-flight events of the old session are ignored.
    pub async fn leave_channel(&mut self) {
        if !self.session.is_active() {
            return;
        }

        self.peers.reset();
        self.streams.clear();
        self.router.detach();
        self.reconciler.leave().await;
        if let Some(mut source) = self.session.deactivate() {
            source.release();
        }
        self.session.advance_generation();
        info!("left channel");
    }

    /// Toggle local track enablement. Never renegotiates a link; the flag
    /// is remembered and applied to the next acquired source too.
    pub fn set_muted(&mut self, muted: bool) {
        self.session.set_muted(muted);
        if let Some(source) = self.session.audio_source_mut() {
            source.set_enabled(!muted);
        }
    }

    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.session.muted());
    }

    /// Re-derive the roster and reconcile links against it: retire links
    /// whose remote left, dial present members we are responsible for that
    /// have no link. This is both the membership-change reaction and the
    /// periodic self-heal (the latter closes the window where two
    /// participants joined an empty channel at the same time).
    pub async fn resync(&mut self) {
        if !self.session.is_active() {
            return;
        }

        if let Err(error) = self.reconciler.refresh().await {
            warn!(%error, "roster refresh failed; keeping the last snapshot");
        }
        self.reconcile_links().await;
        self.flush_signals().await;
    }

    /// Apply one session event. Events stamped with a previous generation
    /// are dropped: they belong to a session that has since been torn down.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        if event.generation() != self.session.generation() {
            trace!(generation = %event.generation(), "stale event from a previous session dropped");
            return;
        }

        match event {
            SessionEvent::MembershipChanged { .. } => self.resync().await,
            SessionEvent::Signal { envelope, .. } => {
                let Some((from, payload)) = self.router.route(envelope) else {
                    return;
                };
                let outcome = match payload {
                    SignalPayload::Offer { sdp } => self.peers.handle_remote_offer(from, sdp).await,
                    SignalPayload::Answer { sdp } => {
                        self.peers.handle_remote_answer(from, sdp).await
                    }
                    SignalPayload::Candidate { candidate } => {
                        self.peers.handle_remote_candidate(from, candidate).await
                    }
                };
                if let Err(error) = outcome {
                    // Scoped to the offending message; the link keeps its
                    // prior state and siblings are untouched.
                    warn!(%from, %error, "negotiation message dropped");
                }
                self.flush_signals().await;
            }
            SessionEvent::Link { event, .. } => {
                match self.peers.handle_link_event(event) {
                    LinkUpdate::None => {}
                    LinkUpdate::StreamAdded(stream) => {
                        debug!(source = %stream.source, "remote stream attached");
                        self.streams.insert(stream.source, stream);
                    }
                    LinkUpdate::Retired { remote } => self.prune_streams(remote),
                }
                self.flush_signals().await;
            }
        }
    }

    /// Drain and handle everything currently queued. The deterministic
    /// pump used by tests and embedders with their own loop.
    pub async fn process_pending(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event).await;
        }
    }

    /// Drive the session forever: react to queued events and run the
    /// periodic heal tick.
    pub async fn run(&mut self) {
        let mut heal = tokio::time::interval(self.config.heal_interval);
        heal.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
                _ = heal.tick() => self.resync().await,
            }
        }
    }

    async fn reconcile_links(&mut self) {
        let roster = self.reconciler.roster().clone();

        for remote in self.peers.remotes() {
            if !roster.contains(remote) && self.peers.retire(remote) {
                self.prune_streams(remote);
                debug!(%remote, "participant left the roster; link retired");
            }
        }

        for remote in roster.iter() {
            if !self.peers.contains(remote) && self.local.initiates_toward(remote) {
                if let Err(error) = self.peers.ensure_initiated(remote).await {
                    warn!(%remote, %error, "failed to initiate toward participant");
                }
            }
        }
    }

    async fn flush_signals(&mut self) {
        while let Some(signal) = self.peers.pop_signal() {
            self.router.send(signal.to, signal.payload).await;
        }
    }

    fn prune_streams(&mut self, remote: ParticipantId) {
        if self.streams.remove(&remote).is_some() {
            debug!(%remote, "remote stream pruned");
        }
    }
}
