//! Connectivity session boundary
//!
//! One connectivity session is one negotiated media connection to one
//! remote peer. The core drives sessions through the offer/answer/candidate
//! primitives; sessions report back (candidate discovery, inbound tracks,
//! transport transitions) by posting `LinkEvent`s into the session sink,
//! each tagged with the `LinkId` it belongs to.

use chorus_core::{
    AudioSourceHandle, IceCandidate, LinkId, MeshResult, ParticipantId, Sdp, SessionSink,
};

/// ICE endpoints handed to every new connectivity session.
#[derive(Clone, Debug)]
pub struct ConnectivityConfig {
    pub ice_servers: Vec<String>,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig {
            ice_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
        }
    }
}

/// Creates connectivity sessions.
#[allow(async_fn_in_trait)]
pub trait ConnectivityFactory {
    type Session: ConnectivitySession;

    async fn create(
        &self,
        link: LinkId,
        remote: ParticipantId,
        config: &ConnectivityConfig,
        sink: SessionSink,
    ) -> MeshResult<Self::Session>;
}

/// One negotiated media connection, exclusively owned by its `PeerLink`.
#[allow(async_fn_in_trait)]
pub trait ConnectivitySession {
    async fn create_offer(&mut self) -> MeshResult<Sdp>;

    async fn create_answer(&mut self) -> MeshResult<Sdp>;

    async fn set_local_description(&mut self, sdp: Sdp) -> MeshResult<()>;

    async fn set_remote_description(&mut self, sdp: Sdp) -> MeshResult<()>;

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> MeshResult<()>;

    /// Attach a read-only reference to the local audio source to the
    /// outgoing leg. Never transfers ownership.
    fn attach_audio(&mut self, source: AudioSourceHandle);

    /// Tear the connection down. Idempotent.
    fn close(&mut self);
}
