//! Identity types for Chorus
//!
//! All identifiers are 64-bit newtypes: opaque to the core, cheap to copy,
//! and stable for the lifetime of the entity they name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Channel identity - names one voice channel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl ChannelId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ChannelId(id)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({:016x})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Participant identity - one authenticated user, stable for their session.
///
/// Ordered: the ordering is load-bearing. For any pair of participants the
/// lower id always acts as the negotiation initiator, which makes mesh
/// formation independent of join order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    #[inline]
    pub fn new(id: u64) -> Self {
        ParticipantId(id)
    }

    /// Symmetric initiation tie-break: the lower id dials.
    #[inline]
    pub fn initiates_toward(self, other: ParticipantId) -> bool {
        self.0 < other.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant({:016x})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Link identity - one *instance* of a peer link.
///
/// A retired-then-recreated link gets a fresh LinkId, so stale callbacks for
/// the predecessor can be told apart from events meant for the current link.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkId(pub u64);

impl LinkId {
    #[inline]
    pub fn new(id: u64) -> Self {
        LinkId(id)
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Link({})", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session generation - bumped on every join and leave.
///
/// Events entering the session queue are stamped with the generation of the
/// sink that produced them; the reactor drops events from any other
/// generation, which cancels every in-flight continuation of a session that
/// has since been torn down.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    #[inline]
    pub fn next(self) -> Self {
        SessionGeneration(self.0 + 1)
    }
}

impl fmt::Debug for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen({})", self.0)
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream identity - one inbound media stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamId(pub u64);

impl StreamId {
    #[inline]
    pub fn new(id: u64) -> Self {
        StreamId(id)
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stream({})", self.0)
    }
}
