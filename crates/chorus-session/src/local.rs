//! Local session state
//!
//! One `LocalSession` per client process: which channel is active, the
//! exclusively-owned audio source, the mute flag, and the generation
//! counter that invalidates stale asynchronous continuations after every
//! join or leave.

use chorus_core::{ChannelId, SessionGeneration};

/// Session-scoped state, replaced wholesale on every join/leave.
///
/// Invariant: no active channel implies no audio source (and the
/// controller holding this keeps it implying no peer links either).
pub struct LocalSession<S> {
    active_channel: Option<ChannelId>,
    audio_source: Option<S>,
    muted: bool,
    generation: SessionGeneration,
}

impl<S> LocalSession<S> {
    pub fn new() -> Self {
        LocalSession {
            active_channel: None,
            audio_source: None,
            muted: false,
            generation: SessionGeneration::default(),
        }
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        self.active_channel
    }

    pub fn is_active(&self) -> bool {
        self.active_channel.is_some()
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// The mute flag outlives individual sessions: it is applied to each
    /// newly acquired source at join time.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    /// Bump the generation, invalidating every event stamped under the
    /// previous one.
    pub fn advance_generation(&mut self) -> SessionGeneration {
        self.generation = self.generation.next();
        self.generation
    }

    pub fn audio_source_mut(&mut self) -> Option<&mut S> {
        self.audio_source.as_mut()
    }

    /// Enter a channel with a freshly acquired audio source.
    pub fn activate(&mut self, channel: ChannelId, source: S) {
        debug_assert!(self.active_channel.is_none());
        self.active_channel = Some(channel);
        self.audio_source = Some(source);
    }

    /// Clear the session, handing the audio source back for release.
    pub fn deactivate(&mut self) -> Option<S> {
        self.active_channel = None;
        self.audio_source.take()
    }
}

impl<S> Default for LocalSession<S> {
    fn default() -> Self {
        Self::new()
    }
}
