//! Fake audio device
//!
//! Tracks acquisitions and releases so the rollback scenarios can assert
//! that no audio handle leaks when a join unwinds. Sources deliberately do
//! not release themselves on drop - a leak should fail the assertion, not
//! be papered over.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use chorus_core::{AudioConstraints, AudioSourceHandle, MeshError, MeshResult};
use chorus_session::{AudioDevice, AudioSource};

struct SourceShared {
    handle: AudioSourceHandle,
    enabled: Mutex<bool>,
    released: AtomicBool,
}

/// Read-only view of one acquired source.
#[derive(Clone)]
pub struct SourceProbe {
    shared: Arc<SourceShared>,
}

impl SourceProbe {
    pub fn handle(&self) -> AudioSourceHandle {
        self.shared.handle
    }

    pub fn enabled(&self) -> bool {
        *self.shared.enabled.lock()
    }

    pub fn released(&self) -> bool {
        self.shared.released.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct DeviceInner {
    fail_acquire: AtomicBool,
    acquired: AtomicU64,
    released: AtomicU64,
    next_handle: AtomicU64,
    sources: Mutex<Vec<Arc<SourceShared>>>,
}

/// Cloneable device handle; one per client in the scenarios.
#[derive(Clone, Default)]
pub struct FakeAudioDevice {
    inner: Arc<DeviceInner>,
}

impl FakeAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.inner.fail_acquire.store(fail, Ordering::Relaxed);
    }

    pub fn acquired(&self) -> u64 {
        self.inner.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::Relaxed)
    }

    /// Probe of the most recently acquired source.
    pub fn source(&self) -> Option<SourceProbe> {
        self.inner
            .sources
            .lock()
            .last()
            .map(|shared| SourceProbe {
                shared: Arc::clone(shared),
            })
    }
}

/// One captured local audio source.
pub struct FakeAudioSource {
    shared: Arc<SourceShared>,
    device: Arc<DeviceInner>,
}

impl AudioSource for FakeAudioSource {
    fn handle(&self) -> AudioSourceHandle {
        self.shared.handle
    }

    fn set_enabled(&mut self, enabled: bool) {
        *self.shared.enabled.lock() = enabled;
    }

    fn release(&mut self) {
        if !self.shared.released.swap(true, Ordering::Relaxed) {
            self.device.released.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl AudioDevice for FakeAudioDevice {
    type Source = FakeAudioSource;

    async fn acquire(&self, _constraints: AudioConstraints) -> MeshResult<Self::Source> {
        if self.inner.fail_acquire.load(Ordering::Relaxed) {
            return Err(MeshError::AudioUnavailable("capture device denied".into()));
        }

        let handle =
            AudioSourceHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        let shared = Arc::new(SourceShared {
            handle,
            enabled: Mutex::new(true),
            released: AtomicBool::new(false),
        });
        self.inner.sources.lock().push(Arc::clone(&shared));
        self.inner.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(FakeAudioSource {
            shared,
            device: Arc::clone(&self.inner),
        })
    }
}
