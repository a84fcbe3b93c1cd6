//! Error types for Chorus

use thiserror::Error;

use crate::id::{ChannelId, ParticipantId};

/// Workspace-wide error taxonomy.
///
/// Join-time audio and membership failures are session-fatal and rolled
/// back by the caller; relay failures degrade the affected operation to a
/// logged no-op; negotiation failures are scoped to one message and one
/// link; transport failures retire one link and never propagate to
/// siblings.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("audio device unavailable: {0}")]
    AudioUnavailable(String),

    #[error("membership store unavailable: {0}")]
    MembershipUnavailable(String),

    #[error("signaling relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("negotiation rejected: {0}")]
    NegotiationRejected(String),

    #[error("peer {0} unreachable")]
    PeerUnreachable(ParticipantId),

    #[error("already joined to channel {0}")]
    AlreadyInChannel(ChannelId),
}

/// Result type for Chorus operations.
pub type MeshResult<T> = Result<T, MeshError>;
