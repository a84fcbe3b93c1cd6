//! In-memory membership store
//!
//! Shared-state store for multi-client scenarios: presence rows per
//! channel, change notification fan-out to every subscriber of the
//! channel, and failure/staleness toggles for the rollback and
//! simultaneous-join tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use chorus_core::{Channel, ChannelId, MeshError, MeshResult, ParticipantId, SessionSink};
use chorus_membership::MembershipStore;

struct Watcher {
    id: u64,
    channel: ChannelId,
    sink: SessionSink,
}

#[derive(Default)]
struct MembershipState {
    channels: Vec<Channel>,
    rows: BTreeMap<ChannelId, BTreeSet<ParticipantId>>,
    watchers: Vec<Watcher>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<MembershipState>,
    next_watcher: AtomicU64,
    next_channel: AtomicU64,
    fail_fetch: AtomicBool,
    fail_upsert: AtomicBool,
    fail_delete: AtomicBool,
    fail_subscribe: AtomicBool,
    mute_notifications: AtomicBool,
    serve_empty_snapshot: AtomicBool,
}

/// Cloneable handle to one shared store.
#[derive(Clone, Default)]
pub struct InMemoryMembership {
    inner: Arc<Inner>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel to the directory.
    pub fn create_channel(&self, name: &str) -> ChannelId {
        let id = ChannelId::new(self.inner.next_channel.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.state.lock().channels.push(Channel {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Current presence rows of a channel.
    pub fn members(&self, channel: ChannelId) -> Vec<ParticipantId> {
        self.inner
            .state
            .lock()
            .rows
            .get(&channel)
            .map(|rows| rows.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.inner.fail_fetch.store(fail, Ordering::Relaxed);
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.inner.fail_upsert.store(fail, Ordering::Relaxed);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.inner.fail_delete.store(fail, Ordering::Relaxed);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    /// Suppress change notifications, simulating a lagging feed.
    pub fn mute_notifications(&self, mute: bool) {
        self.inner.mute_notifications.store(mute, Ordering::Relaxed);
    }

    /// Serve empty roster snapshots regardless of the rows, simulating
    /// reads that race concurrent presence writes.
    pub fn serve_empty_snapshot(&self, stale: bool) {
        self.inner.serve_empty_snapshot.store(stale, Ordering::Relaxed);
    }

    fn notify(&self, channel: ChannelId) {
        if self.inner.mute_notifications.load(Ordering::Relaxed) {
            return;
        }
        let sinks: Vec<SessionSink> = self
            .inner
            .state
            .lock()
            .watchers
            .iter()
            .filter(|watcher| watcher.channel == channel)
            .map(|watcher| watcher.sink.clone())
            .collect();
        for sink in sinks {
            sink.membership_changed(channel);
        }
    }
}

/// RAII change-feed handle; dropping it unsubscribes.
pub struct MembershipSubscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for MembershipSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .state
                .lock()
                .watchers
                .retain(|watcher| watcher.id != self.id);
        }
    }
}

impl MembershipStore for InMemoryMembership {
    type Subscription = MembershipSubscription;

    async fn list_channels(&self) -> MeshResult<Vec<Channel>> {
        Ok(self.inner.state.lock().channels.clone())
    }

    async fn fetch_roster(&self, channel: ChannelId) -> MeshResult<Vec<ParticipantId>> {
        if self.inner.fail_fetch.load(Ordering::Relaxed) {
            return Err(MeshError::MembershipUnavailable("fetch refused".into()));
        }
        if self.inner.serve_empty_snapshot.load(Ordering::Relaxed) {
            return Ok(Vec::new());
        }
        Ok(self.members(channel))
    }

    async fn upsert_presence(
        &self,
        channel: ChannelId,
        participant: ParticipantId,
    ) -> MeshResult<()> {
        if self.inner.fail_upsert.load(Ordering::Relaxed) {
            return Err(MeshError::MembershipUnavailable("upsert refused".into()));
        }
        self.inner
            .state
            .lock()
            .rows
            .entry(channel)
            .or_default()
            .insert(participant);
        self.notify(channel);
        Ok(())
    }

    async fn delete_presence(
        &self,
        channel: ChannelId,
        participant: ParticipantId,
    ) -> MeshResult<()> {
        if self.inner.fail_delete.load(Ordering::Relaxed) {
            return Err(MeshError::MembershipUnavailable("delete refused".into()));
        }
        let removed = self
            .inner
            .state
            .lock()
            .rows
            .get_mut(&channel)
            .map(|rows| rows.remove(&participant))
            .unwrap_or(false);
        if removed {
            self.notify(channel);
        }
        Ok(())
    }

    async fn subscribe_changes(
        &self,
        channel: ChannelId,
        sink: SessionSink,
    ) -> MeshResult<Self::Subscription> {
        if self.inner.fail_subscribe.load(Ordering::Relaxed) {
            return Err(MeshError::MembershipUnavailable("subscribe refused".into()));
        }
        let id = self.inner.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.inner.state.lock().watchers.push(Watcher {
            id,
            channel,
            sink,
        });
        Ok(MembershipSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        })
    }
}
