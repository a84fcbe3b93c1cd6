//! Signaling router
//!
//! Thin addressing layer over the relay: outbound payloads get enveloped
//! with the local sender id; inbound envelopes not addressed to the local
//! participant (or echoed back from our own publishes) are dropped without
//! side effect. Publish failures degrade to logged no-ops - callers never
//! block on delivery confirmation, and a flaky relay must not tear down
//! links that are already connected.

use tracing::{debug, warn};

use chorus_core::{
    ChannelId, MeshResult, ParticipantId, SessionSink, SignalEnvelope, SignalPayload, Topic,
};

use crate::relay::SignalingRelay;

struct Binding<S> {
    topic: Topic,
    _subscription: S,
}

/// Routes addressed negotiation messages to and from the relay.
pub struct SignalingRouter<R: SignalingRelay> {
    relay: R,
    local: ParticipantId,
    binding: Option<Binding<R::Subscription>>,
}

impl<R: SignalingRelay> SignalingRouter<R> {
    pub fn new(relay: R, local: ParticipantId) -> Self {
        SignalingRouter {
            relay,
            local,
            binding: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_some()
    }

    /// Subscribe to the channel's signaling topic. Successful completion is
    /// the one-time readiness point: once this returns, inbound envelopes
    /// flow and the caller performs its initial mesh initiation.
    pub async fn attach(&mut self, channel: ChannelId, sink: SessionSink) -> MeshResult<()> {
        let topic = Topic::signaling(channel);
        let subscription = self.relay.subscribe(topic.clone(), sink).await?;
        debug!(%channel, %topic, "signaling subscription established");
        self.binding = Some(Binding {
            topic,
            _subscription: subscription,
        });
        Ok(())
    }

    /// Drop the subscription. Outbound sends become no-ops until the next
    /// attach.
    pub fn detach(&mut self) {
        self.binding = None;
    }

    /// Envelope a payload and publish it. Failures are logged and absorbed.
    pub async fn send(&self, to: ParticipantId, payload: SignalPayload) {
        let Some(binding) = &self.binding else {
            warn!(%to, kind = payload.kind(), "dropping outbound signal: not subscribed to relay");
            return;
        };

        let envelope = SignalEnvelope {
            from: self.local,
            to,
            payload,
        };
        if let Err(error) = self.relay.publish(&binding.topic, envelope).await {
            warn!(%to, %error, "relay publish failed; signal dropped");
        }
    }

    /// Demultiplex one observed envelope. Returns the sender and payload if
    /// the envelope is addressed to the local participant, `None` for
    /// traffic meant for other subscribers or echoed from ourselves.
    pub fn route(&self, envelope: SignalEnvelope) -> Option<(ParticipantId, SignalPayload)> {
        if envelope.to != self.local || envelope.from == self.local {
            return None;
        }
        Some((envelope.from, envelope.payload))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use chorus_core::{MeshError, Sdp, SessionGeneration};

    use super::*;

    #[derive(Clone, Default)]
    struct TestRelay {
        published: Arc<Mutex<Vec<(Topic, SignalEnvelope)>>>,
        fail_subscribe: Arc<Mutex<bool>>,
    }

    impl SignalingRelay for TestRelay {
        type Subscription = ();

        async fn subscribe(
            &self,
            _topic: Topic,
            _sink: SessionSink,
        ) -> MeshResult<Self::Subscription> {
            if *self.fail_subscribe.lock() {
                return Err(MeshError::RelayUnavailable("subscribe refused".into()));
            }
            Ok(())
        }

        async fn publish(&self, topic: &Topic, envelope: SignalEnvelope) -> MeshResult<()> {
            self.published.lock().push((topic.clone(), envelope));
            Ok(())
        }
    }

    fn sink() -> SessionSink {
        let (tx, _rx) = mpsc::channel(16);
        SessionSink::new(tx, SessionGeneration::default())
    }

    fn offer() -> SignalPayload {
        SignalPayload::Offer {
            sdp: Sdp("v=0".into()),
        }
    }

    #[tokio::test]
    async fn test_send_before_attach_is_a_noop() {
        let relay = TestRelay::default();
        let router = SignalingRouter::new(relay.clone(), ParticipantId::new(1));

        router.send(ParticipantId::new(2), offer()).await;

        assert!(relay.published.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_envelopes_with_local_sender() {
        let relay = TestRelay::default();
        let mut router = SignalingRouter::new(relay.clone(), ParticipantId::new(1));
        router.attach(ChannelId::new(4), sink()).await.unwrap();

        router.send(ParticipantId::new(2), offer()).await;

        let published = relay.published.lock();
        let (topic, envelope) = &published[0];
        assert_eq!(*topic, Topic::signaling(ChannelId::new(4)));
        assert_eq!(envelope.from, ParticipantId::new(1));
        assert_eq!(envelope.to, ParticipantId::new(2));
    }

    #[tokio::test]
    async fn test_route_drops_foreign_and_echoed_traffic() {
        let relay = TestRelay::default();
        let router = SignalingRouter::new(relay, ParticipantId::new(1));

        // Addressed to someone else.
        assert!(router
            .route(SignalEnvelope {
                from: ParticipantId::new(2),
                to: ParticipantId::new(3),
                payload: offer(),
            })
            .is_none());

        // Our own publish echoed back by the broadcast.
        assert!(router
            .route(SignalEnvelope {
                from: ParticipantId::new(1),
                to: ParticipantId::new(2),
                payload: offer(),
            })
            .is_none());

        // Addressed to us.
        let (from, _) = router
            .route(SignalEnvelope {
                from: ParticipantId::new(2),
                to: ParticipantId::new(1),
                payload: offer(),
            })
            .unwrap();
        assert_eq!(from, ParticipantId::new(2));
    }

    #[tokio::test]
    async fn test_subscribe_failure_surfaces_and_leaves_router_detached() {
        let relay = TestRelay::default();
        *relay.fail_subscribe.lock() = true;
        let mut router = SignalingRouter::new(relay, ParticipantId::new(1));

        let error = router.attach(ChannelId::new(4), sink()).await.unwrap_err();
        assert!(matches!(error, MeshError::RelayUnavailable(_)));
        assert!(!router.is_attached());
    }
}
