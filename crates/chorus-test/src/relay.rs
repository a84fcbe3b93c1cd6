//! Loopback signaling relay
//!
//! Synchronous topic fan-out that preserves per-sender publish order, plus
//! seeded chaos for the at-least-once and lossy-delivery scenarios. Every
//! subscriber of a topic observes every delivered envelope, including the
//! publisher's own - filtering is the router's job, as with a real
//! broadcast transport.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chorus_core::{MeshError, MeshResult, SessionSink, SignalEnvelope, Topic};
use chorus_signal::SignalingRelay;

/// Delivery fault injection. Probabilities of 0.0 and 1.0 keep scenarios
/// deterministic.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelayChaos {
    pub drop_probability: f64,
    pub duplicate_probability: f64,
}

struct Subscriber {
    id: u64,
    topic: Topic,
    sink: SessionSink,
}

struct RelayState {
    subscribers: Vec<Subscriber>,
    chaos: RelayChaos,
    rng: StdRng,
}

struct Inner {
    state: Mutex<RelayState>,
    next_subscriber: AtomicU64,
    fail_subscribe: AtomicBool,
    fail_publish: AtomicBool,
}

/// Cloneable handle to one shared relay.
#[derive(Clone)]
pub struct LoopbackRelay {
    inner: Arc<Inner>,
}

impl LoopbackRelay {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Deterministic chaos decisions for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        LoopbackRelay {
            inner: Arc::new(Inner {
                state: Mutex::new(RelayState {
                    subscribers: Vec::new(),
                    chaos: RelayChaos::default(),
                    rng: StdRng::seed_from_u64(seed),
                }),
                next_subscriber: AtomicU64::new(0),
                fail_subscribe: AtomicBool::new(false),
                fail_publish: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_chaos(&self, chaos: RelayChaos) {
        self.inner.state.lock().chaos = chaos;
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::Relaxed);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }
}

impl Default for LoopbackRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII subscription handle; dropping it unsubscribes.
pub struct RelaySubscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for RelaySubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .state
                .lock()
                .subscribers
                .retain(|subscriber| subscriber.id != self.id);
        }
    }
}

impl SignalingRelay for LoopbackRelay {
    type Subscription = RelaySubscription;

    async fn subscribe(&self, topic: Topic, sink: SessionSink) -> MeshResult<Self::Subscription> {
        if self.inner.fail_subscribe.load(Ordering::Relaxed) {
            return Err(MeshError::RelayUnavailable("subscribe refused".into()));
        }
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner.state.lock().subscribers.push(Subscriber {
            id,
            topic,
            sink,
        });
        Ok(RelaySubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        })
    }

    async fn publish(&self, topic: &Topic, envelope: SignalEnvelope) -> MeshResult<()> {
        if self.inner.fail_publish.load(Ordering::Relaxed) {
            return Err(MeshError::RelayUnavailable("publish refused".into()));
        }

        let mut state = self.inner.state.lock();
        let chaos = state.chaos;
        let copies = if chaos.drop_probability > 0.0 && state.rng.gen_bool(chaos.drop_probability)
        {
            0
        } else if chaos.duplicate_probability > 0.0
            && state.rng.gen_bool(chaos.duplicate_probability)
        {
            2
        } else {
            1
        };

        let sinks: Vec<SessionSink> = state
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.topic == *topic)
            .map(|subscriber| subscriber.sink.clone())
            .collect();
        drop(state);

        for _ in 0..copies {
            for sink in &sinks {
                sink.signal(envelope.clone());
            }
        }
        Ok(())
    }
}
