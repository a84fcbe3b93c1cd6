//! End-to-end mesh scenarios
//!
//! Multi-client sessions over the shared in-memory backend, pumped
//! deterministically with `settle`.

use chorus_core::{MeshError, ParticipantId, Sdp, SignalEnvelope, SignalPayload, Topic};
use chorus_peer::{LinkRole, LinkState};
use chorus_signal::SignalingRelay;

use crate::bed::{settle, TestBed};
use crate::relay::RelayChaos;

#[tokio::test]
async fn joining_an_empty_channel_initiates_nothing() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);

    let roster = a.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a]).await;

    assert!(roster.is_empty());
    assert_eq!(a.connectivity.sessions_created(), 0);
    assert_eq!(a.controller.active_channel(), Some(channel));
}

#[tokio::test]
async fn two_participants_form_a_mesh() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    a.controller.join_channel(channel).await.unwrap();
    let roster = b.controller.join_channel(channel).await.unwrap();
    assert!(roster.contains(a.id()));

    settle(&mut [&mut a, &mut b]).await;

    assert_eq!(a.controller.peer_state(b.id()), Some(LinkState::Connected));
    assert_eq!(b.controller.peer_state(a.id()), Some(LinkState::Connected));

    // Inbound streams are tagged with the remote that produced them.
    assert_eq!(a.controller.remote_stream(b.id()).unwrap().source, b.id());
    assert_eq!(b.controller.remote_stream(a.id()).unwrap().source, a.id());
}

#[tokio::test]
async fn mesh_forms_regardless_of_join_order() {
    // The higher id joins first, so the dialer (lower id) arrives second
    // and initiates from its join-time snapshot.
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut high = bed.client(9);
    let mut low = bed.client(3);

    high.controller.join_channel(channel).await.unwrap();
    low.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut high, &mut low]).await;

    assert_eq!(
        low.controller.peer_role(high.id()),
        Some(LinkRole::Initiator)
    );
    assert_eq!(
        high.controller.peer_role(low.id()),
        Some(LinkRole::Responder)
    );
    assert_eq!(
        low.controller.peer_state(high.id()),
        Some(LinkState::Connected)
    );
    assert_eq!(
        high.controller.peer_state(low.id()),
        Some(LinkState::Connected)
    );
}

#[tokio::test]
async fn three_participants_form_a_full_mesh() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);
    let mut c = bed.client(3);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    c.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b, &mut c]).await;

    for (client, others) in [(&a, [2u64, 3]), (&b, [1, 3]), (&c, [1, 2])] {
        for other in others {
            assert_eq!(
                client.controller.peer_state(ParticipantId::new(other)),
                Some(LinkState::Connected),
                "participant {} is not connected to {}",
                client.id(),
                other
            );
        }
        assert_eq!(client.controller.connected_peers().len(), 2);
    }

    // The lower id of every pair dialed.
    assert_eq!(a.controller.peer_role(b.id()), Some(LinkRole::Initiator));
    assert_eq!(a.controller.peer_role(c.id()), Some(LinkRole::Initiator));
    assert_eq!(b.controller.peer_role(c.id()), Some(LinkRole::Initiator));
    assert_eq!(b.controller.peer_role(a.id()), Some(LinkRole::Responder));
    assert_eq!(c.controller.peer_role(a.id()), Some(LinkRole::Responder));
    assert_eq!(c.controller.peer_role(b.id()), Some(LinkRole::Responder));
}

#[tokio::test]
async fn leaving_retires_remote_links_and_prunes_streams() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b]).await;
    assert!(a.controller.remote_stream(b.id()).is_some());

    b.controller.leave_channel().await;
    settle(&mut [&mut a, &mut b]).await;

    // The leaver's side is fully torn down and the audio source released.
    assert!(b.controller.active_channel().is_none());
    assert_eq!(b.audio.acquired(), 1);
    assert_eq!(b.audio.released(), 1);
    assert!(b.connectivity.probe(a.id()).unwrap().closed());

    // The remaining side observed the membership change, retired its link,
    // and pruned the stream tagged to the leaver.
    assert_eq!(a.controller.peer_state(b.id()), None);
    assert!(a.controller.remote_stream(b.id()).is_none());
    assert!(a.connectivity.probe(b.id()).unwrap().closed());
    assert!(a.controller.roster().is_empty());
}

#[tokio::test]
async fn membership_write_failure_releases_audio_before_surfacing() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    bed.membership.fail_upsert(true);

    let error = a.controller.join_channel(channel).await.unwrap_err();

    assert!(matches!(error, MeshError::MembershipUnavailable(_)));
    assert!(a.controller.active_channel().is_none());
    assert_eq!(a.audio.acquired(), 1);
    assert_eq!(a.audio.released(), 1);
}

#[tokio::test]
async fn audio_failure_fails_join_without_presence() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    a.audio.fail_acquire(true);

    let error = a.controller.join_channel(channel).await.unwrap_err();

    assert!(matches!(error, MeshError::AudioUnavailable(_)));
    assert!(bed.membership.members(channel).is_empty());
    assert!(a.controller.active_channel().is_none());
}

#[tokio::test]
async fn relay_subscribe_failure_rolls_back_presence_and_audio() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    bed.relay.fail_subscribe(true);

    let error = a.controller.join_channel(channel).await.unwrap_err();

    assert!(matches!(error, MeshError::RelayUnavailable(_)));
    assert!(bed.membership.members(channel).is_empty());
    assert_eq!(a.audio.released(), 1);
    assert!(a.controller.active_channel().is_none());
}

#[tokio::test]
async fn join_while_active_fails_fast() {
    let bed = TestBed::new();
    let general = bed.channel("general");
    let lobby = bed.channel("lobby");
    let mut a = bed.client(1);

    a.controller.join_channel(general).await.unwrap();

    let error = a.controller.join_channel(lobby).await.unwrap_err();
    assert!(matches!(error, MeshError::AlreadyInChannel(c) if c == general));

    a.controller.leave_channel().await;
    a.controller.join_channel(lobby).await.unwrap();
    assert_eq!(a.controller.active_channel(), Some(lobby));
}

#[tokio::test]
async fn leave_without_active_channel_is_a_noop() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);

    a.controller.leave_channel().await;
    assert!(a.controller.active_channel().is_none());

    // The session is still usable afterwards.
    a.controller.join_channel(channel).await.unwrap();
    assert_eq!(a.controller.active_channel(), Some(channel));
}

#[tokio::test]
async fn events_from_a_previous_session_are_dropped_after_leave() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    // The higher id joins first so the second joiner dials it.
    let mut a = bed.client(2);
    let mut b = bed.client(1);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    // b's offer is now sitting unprocessed in a's queue.

    a.controller.leave_channel().await;
    settle(&mut [&mut a, &mut b]).await;

    // The stale offer belonged to the previous generation: no responder
    // link, no connectivity session on a's side.
    assert_eq!(a.connectivity.sessions_created(), 0);
    assert!(a.controller.connected_peers().is_empty());
}

#[tokio::test]
async fn duplicate_answer_does_not_renegotiate() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b]).await;

    let probe = a.connectivity.probe(b.id()).unwrap();
    assert_eq!(probe.remote_description_count(), 1);

    // Replay the answer, as an at-least-once relay might.
    bed.relay
        .publish(
            &Topic::signaling(channel),
            SignalEnvelope {
                from: b.id(),
                to: a.id(),
                payload: SignalPayload::Answer {
                    sdp: Sdp("answer:replayed".into()),
                },
            },
        )
        .await
        .unwrap();
    settle(&mut [&mut a, &mut b]).await;

    assert_eq!(probe.remote_description_count(), 1);
    assert_eq!(a.controller.peer_state(b.id()), Some(LinkState::Connected));
}

#[tokio::test]
async fn mesh_survives_duplicated_delivery() {
    let bed = TestBed::new();
    bed.relay.set_chaos(RelayChaos {
        drop_probability: 0.0,
        duplicate_probability: 1.0,
    });
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b]).await;

    // At most one link per remote despite every message arriving twice.
    assert_eq!(a.connectivity.sessions_created(), 1);
    assert_eq!(b.connectivity.sessions_created(), 1);
    assert_eq!(a.controller.peer_state(b.id()), Some(LinkState::Connected));
    assert_eq!(b.controller.peer_state(a.id()), Some(LinkState::Connected));
}

#[tokio::test]
async fn transport_failure_retires_one_link_and_heals() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);
    let mut c = bed.client(3);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    c.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b, &mut c]).await;

    let broken_probe = a.connectivity.probe(b.id()).unwrap();
    a.connectivity.break_transport(b.id());
    a.controller.process_pending().await;

    // Only the failed link is gone; the sibling is untouched.
    assert_eq!(a.controller.peer_state(b.id()), None);
    assert!(a.controller.remote_stream(b.id()).is_none());
    assert!(broken_probe.closed());
    assert_eq!(a.controller.peer_state(c.id()), Some(LinkState::Connected));
    assert!(!a.connectivity.probe(c.id()).unwrap().closed());

    // The heal pass re-dials and the responder re-answers through its
    // surviving link.
    a.controller.resync().await;
    settle(&mut [&mut a, &mut b, &mut c]).await;

    assert_eq!(a.controller.peer_state(b.id()), Some(LinkState::Connected));
    assert_eq!(a.controller.remote_stream(b.id()).unwrap().source, b.id());
}

#[tokio::test]
async fn simultaneous_empty_joins_self_heal() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    // Both presence writes race both snapshot reads: each side sees an
    // empty channel and hears no change notifications.
    bed.membership.mute_notifications(true);
    bed.membership.serve_empty_snapshot(true);

    let roster_a = a.controller.join_channel(channel).await.unwrap();
    let roster_b = b.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b]).await;

    assert!(roster_a.is_empty());
    assert!(roster_b.is_empty());
    assert_eq!(a.connectivity.sessions_created(), 0);
    assert_eq!(b.connectivity.sessions_created(), 0);

    // The store catches up; the periodic re-evaluation closes the gap.
    bed.membership.serve_empty_snapshot(false);
    bed.membership.mute_notifications(false);
    a.controller.resync().await;
    settle(&mut [&mut a, &mut b]).await;

    assert_eq!(a.controller.peer_state(b.id()), Some(LinkState::Connected));
    assert_eq!(b.controller.peer_state(a.id()), Some(LinkState::Connected));
}

#[tokio::test]
async fn mute_toggles_tracks_without_renegotiating() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b]).await;

    let probe = a.connectivity.probe(b.id()).unwrap();
    let local_before = probe.local_description_count();
    let remote_before = probe.remote_description_count();

    a.controller.set_muted(true);
    assert!(a.controller.is_muted());
    assert!(!a.audio.source().unwrap().enabled());

    a.controller.toggle_mute();
    assert!(!a.controller.is_muted());
    assert!(a.audio.source().unwrap().enabled());

    settle(&mut [&mut a, &mut b]).await;
    assert_eq!(probe.local_description_count(), local_before);
    assert_eq!(probe.remote_description_count(), remote_before);
}

#[tokio::test]
async fn mute_flag_applies_to_the_next_acquired_source() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);

    a.controller.set_muted(true);
    a.controller.join_channel(channel).await.unwrap();

    assert!(!a.audio.source().unwrap().enabled());
}

#[tokio::test]
async fn channel_directory_lists_created_channels() {
    let bed = TestBed::new();
    bed.channel("general");
    bed.channel("lobby");
    let a = bed.client(1);

    let channels = a.controller.channels().await.unwrap();
    let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["general", "lobby"]);
}

#[tokio::test]
async fn audio_handle_is_attached_to_every_leg() {
    let bed = TestBed::new();
    let channel = bed.channel("general");
    let mut a = bed.client(1);
    let mut b = bed.client(2);

    a.controller.join_channel(channel).await.unwrap();
    b.controller.join_channel(channel).await.unwrap();
    settle(&mut [&mut a, &mut b]).await;

    let a_handle = a.audio.source().unwrap().handle();
    let b_handle = b.audio.source().unwrap().handle();
    assert_eq!(
        a.connectivity.probe(b.id()).unwrap().attached_audio(),
        Some(a_handle)
    );
    assert_eq!(
        b.connectivity.probe(a.id()).unwrap().attached_audio(),
        Some(b_handle)
    );
}
