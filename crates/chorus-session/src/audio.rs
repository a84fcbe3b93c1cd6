//! Audio device boundary
//!
//! The device yields an exclusively-owned local audio source. The session
//! keeps ownership for its whole lifetime; peer legs only ever attach the
//! source's read-only handle.

use chorus_core::{AudioConstraints, AudioSourceHandle, MeshResult};

/// External audio capture device.
#[allow(async_fn_in_trait)]
pub trait AudioDevice {
    type Source: AudioSource;

    /// Acquire the local audio source. Denied or missing devices surface
    /// `AudioUnavailable`.
    async fn acquire(&self, constraints: AudioConstraints) -> MeshResult<Self::Source>;
}

/// The locally captured audio source.
pub trait AudioSource {
    /// Read-only reference for attaching this source to an outgoing leg.
    fn handle(&self) -> AudioSourceHandle;

    /// Enable or disable the captured tracks without renegotiating
    /// anything.
    fn set_enabled(&mut self, enabled: bool);

    /// Stop capture and release the device. Idempotent.
    fn release(&mut self);
}
