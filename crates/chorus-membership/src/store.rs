//! Membership store boundary
//!
//! The store owns channel and presence records; the core only reads
//! snapshots and writes its own presence row. Change notifications carry no
//! payload guarantee beyond "something changed in this channel".

use chorus_core::{Channel, ChannelId, MeshResult, ParticipantId, SessionSink};

/// External membership store.
///
/// `Subscription` is an RAII handle: dropping it ends the change feed.
#[allow(async_fn_in_trait)]
pub trait MembershipStore {
    type Subscription;

    /// List the channel directory.
    async fn list_channels(&self) -> MeshResult<Vec<Channel>>;

    /// Fetch the full member list of a channel.
    async fn fetch_roster(&self, channel: ChannelId) -> MeshResult<Vec<ParticipantId>>;

    /// Announce presence in a channel.
    async fn upsert_presence(
        &self,
        channel: ChannelId,
        participant: ParticipantId,
    ) -> MeshResult<()>;

    /// Retract presence from a channel.
    async fn delete_presence(
        &self,
        channel: ChannelId,
        participant: ParticipantId,
    ) -> MeshResult<()>;

    /// Subscribe to change notifications scoped to a channel. Each
    /// notification is delivered through `sink.membership_changed`.
    async fn subscribe_changes(
        &self,
        channel: ChannelId,
        sink: SessionSink,
    ) -> MeshResult<Self::Subscription>;
}
