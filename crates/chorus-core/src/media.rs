//! Media tags
//!
//! The core never touches samples; it tracks *which* media belongs to
//! *whom*. Inbound streams are tagged with the remote that produced them at
//! attachment time, so teardown can prune them deterministically instead of
//! leaking stale audio.

use crate::id::{ParticipantId, StreamId};

/// An inbound audio stream, tagged with the remote participant that
/// produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteMediaStream {
    pub id: StreamId,
    pub source: ParticipantId,
}

/// A read-only reference to the locally owned audio source.
///
/// Legs attach this handle; ownership of the source itself never moves out
/// of the local session, and releasing the source invalidates every handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AudioSourceHandle(pub u64);

/// Capture constraints passed to the audio device on acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        AudioConstraints {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}
