//! Signaling relay boundary
//!
//! The relay is a broadcast pub/sub primitive: every subscriber of a topic
//! observes every envelope published to it, including the publisher's own.
//! Delivery is at-least-once within a topic and ordered only per sender.

use chorus_core::{MeshResult, SessionSink, SignalEnvelope, Topic};

/// External signaling relay.
///
/// `Subscription` is an RAII handle: dropping it ends the feed.
#[allow(async_fn_in_trait)]
pub trait SignalingRelay {
    type Subscription;

    /// Subscribe to a topic. Every envelope observed on the topic is
    /// delivered through `sink.signal`.
    async fn subscribe(&self, topic: Topic, sink: SessionSink) -> MeshResult<Self::Subscription>;

    /// Publish an envelope to a topic.
    async fn publish(&self, topic: &Topic, envelope: SignalEnvelope) -> MeshResult<()>;
}
