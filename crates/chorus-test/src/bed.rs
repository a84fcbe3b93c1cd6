//! Scenario bed
//!
//! Wires shared in-memory collaborators into full session controllers and
//! pumps multi-client meshes until their event queues drain. Everything is
//! deterministic: no background tasks, no sleeps - just explicit pump
//! rounds.

use chorus_core::{ChannelId, ParticipantId};
use chorus_session::{SessionConfig, SessionController};

use crate::audio::FakeAudioDevice;
use crate::connectivity::FakeConnectivityFactory;
use crate::membership::InMemoryMembership;
use crate::relay::LoopbackRelay;

/// Controller type every scenario drives.
pub type TestController =
    SessionController<InMemoryMembership, LoopbackRelay, FakeConnectivityFactory, FakeAudioDevice>;

/// Shared backend of one scenario: every client joins through the same
/// membership store and relay.
pub struct TestBed {
    pub membership: InMemoryMembership,
    pub relay: LoopbackRelay,
}

impl TestBed {
    pub fn new() -> Self {
        TestBed {
            membership: InMemoryMembership::new(),
            relay: LoopbackRelay::new(),
        }
    }

    pub fn with_relay_seed(seed: u64) -> Self {
        TestBed {
            membership: InMemoryMembership::new(),
            relay: LoopbackRelay::with_seed(seed),
        }
    }

    pub fn channel(&self, name: &str) -> ChannelId {
        self.membership.create_channel(name)
    }

    /// A client with its own connectivity factory and audio device, wired
    /// to the shared membership store and relay.
    pub fn client(&self, id: u64) -> TestClient {
        let connectivity = FakeConnectivityFactory::new();
        let audio = FakeAudioDevice::new();
        TestClient {
            controller: SessionController::new(
                ParticipantId::new(id),
                self.membership.clone(),
                self.relay.clone(),
                connectivity.clone(),
                audio.clone(),
                SessionConfig::default(),
            ),
            connectivity,
            audio,
        }
    }
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant: the controller plus probes into its fakes.
pub struct TestClient {
    pub controller: TestController,
    pub connectivity: FakeConnectivityFactory,
    pub audio: FakeAudioDevice,
}

impl TestClient {
    pub fn id(&self) -> ParticipantId {
        self.controller.local_participant()
    }
}

/// Pump rounds after which every scripted exchange has quiesced. The
/// deepest chain is offer -> answer -> candidates -> connected, so a
/// handful of full-drain rounds per client is plenty.
const SETTLE_ROUNDS: usize = 8;

/// Drain every client's event queue repeatedly until cross-client signal
/// ping-pong has settled.
pub async fn settle(clients: &mut [&mut TestClient]) {
    for _ in 0..SETTLE_ROUNDS {
        for client in clients.iter_mut() {
            client.controller.process_pending().await;
        }
    }
}
