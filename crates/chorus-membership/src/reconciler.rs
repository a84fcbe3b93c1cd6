//! Roster reconciliation
//!
//! Change payloads from the store are not trusted to be complete or ordered
//! relative to concurrent writes, so every notification triggers a full
//! re-fetch and the roster is replaced wholesale. The exposed roster always
//! equals the most recently completed snapshot.

use tracing::{debug, warn};

use chorus_core::{ChannelId, MeshResult, ParticipantId, Roster, SessionSink};

use crate::store::MembershipStore;

/// Maintains the participant roster for the active channel.
pub struct MembershipReconciler<M: MembershipStore> {
    store: M,
    local: ParticipantId,
    channel: Option<ChannelId>,
    roster: Roster,
    subscription: Option<M::Subscription>,
}

impl<M: MembershipStore> MembershipReconciler<M> {
    pub fn new(store: M, local: ParticipantId) -> Self {
        MembershipReconciler {
            store,
            local,
            channel: None,
            roster: Roster::default(),
            subscription: None,
        }
    }

    pub fn store(&self) -> &M {
        &self.store
    }

    /// The roster from the most recently completed re-fetch.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Announce presence, subscribe to changes, and fetch the initial
    /// snapshot. Any failure unwinds with a best-effort retraction and the
    /// session must not proceed to signaling.
    pub async fn join(&mut self, channel: ChannelId, sink: SessionSink) -> MeshResult<Roster> {
        self.store.upsert_presence(channel, self.local).await?;

        let subscription = match self.store.subscribe_changes(channel, sink).await {
            Ok(subscription) => subscription,
            Err(error) => {
                self.retract(channel).await;
                return Err(error);
            }
        };

        let members = match self.store.fetch_roster(channel).await {
            Ok(members) => members,
            Err(error) => {
                drop(subscription);
                self.retract(channel).await;
                return Err(error);
            }
        };

        let roster = Roster::from_members(members, self.local);
        debug!(%channel, members = roster.len(), "joined channel membership");

        self.channel = Some(channel);
        self.subscription = Some(subscription);
        self.roster = roster.clone();
        Ok(roster)
    }

    /// Re-derive the roster from a fresh full fetch. On fetch failure the
    /// previous snapshot is kept; the next notification or heal tick will
    /// try again.
    pub async fn refresh(&mut self) -> MeshResult<&Roster> {
        let Some(channel) = self.channel else {
            return Ok(&self.roster);
        };

        let members = self.store.fetch_roster(channel).await?;
        self.roster = Roster::from_members(members, self.local);
        Ok(&self.roster)
    }

    /// Retract presence and stop the change feed. Retraction is
    /// best-effort: the store reaps stale presence independently.
    pub async fn leave(&mut self) {
        self.subscription = None;
        if let Some(channel) = self.channel.take() {
            self.retract(channel).await;
        }
        self.roster = Roster::default();
    }

    async fn retract(&self, channel: ChannelId) {
        if let Err(error) = self.store.delete_presence(channel, self.local).await {
            warn!(%channel, %error, "failed to retract presence; relying on store-side reaping");
        }
    }
}
