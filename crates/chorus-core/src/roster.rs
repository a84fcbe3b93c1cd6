//! Roster state
//!
//! The roster is the reconciled set of *other* participants currently
//! present in the active channel. It is only ever replaced wholesale by a
//! completed full re-fetch - change notifications from the membership store
//! carry no payload guarantee, so nothing is hand-merged from them.

use std::collections::BTreeSet;

use crate::id::{ChannelId, ParticipantId};

/// One entry in the channel directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
}

/// The set of remote participants last observed in the active channel.
///
/// Invariant: never contains the local participant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roster {
    members: BTreeSet<ParticipantId>,
}

impl Roster {
    /// Build a roster from a fetched member list, excluding the local
    /// participant and collapsing duplicates.
    pub fn from_members(
        members: impl IntoIterator<Item = ParticipantId>,
        local: ParticipantId,
    ) -> Self {
        Roster {
            members: members.into_iter().filter(|m| *m != local).collect(),
        }
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.members.contains(&participant)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.members.iter().copied()
    }

    /// Membership delta between this roster and a newer one.
    pub fn diff(&self, next: &Roster) -> RosterDelta {
        RosterDelta {
            joined: next.members.difference(&self.members).copied().collect(),
            departed: self.members.difference(&next.members).copied().collect(),
        }
    }
}

/// Participants that joined or departed between two roster snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterDelta {
    pub joined: Vec<ParticipantId>,
    pub departed: Vec<ParticipantId>,
}

impl RosterDelta {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.departed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roster(ids: &[u64]) -> Roster {
        Roster::from_members(
            ids.iter().copied().map(ParticipantId::new),
            ParticipantId::new(u64::MAX),
        )
    }

    #[test]
    fn test_local_participant_excluded() {
        let local = ParticipantId::new(7);
        let roster = Roster::from_members(
            [ParticipantId::new(7), ParticipantId::new(9)],
            local,
        );

        assert!(!roster.contains(local));
        assert!(roster.contains(ParticipantId::new(9)));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_diff_splits_joined_and_departed() {
        let before = roster(&[1, 2, 3]);
        let after = roster(&[2, 3, 4]);

        let delta = before.diff(&after);
        assert_eq!(delta.joined, vec![ParticipantId::new(4)]);
        assert_eq!(delta.departed, vec![ParticipantId::new(1)]);
    }

    #[test]
    fn test_diff_of_identical_rosters_is_empty() {
        let r = roster(&[5, 6]);
        assert!(r.diff(&r.clone()).is_empty());
    }

    proptest! {
        /// Applying a diff to the old member set always yields the new one:
        /// the delta is a faithful partition, never a hand-merged partial.
        #[test]
        fn prop_diff_reconstructs_next_roster(
            before in proptest::collection::btree_set(any::<u64>(), 0..32),
            after in proptest::collection::btree_set(any::<u64>(), 0..32),
        ) {
            let local = ParticipantId::new(u64::MAX);
            let old = Roster::from_members(before.iter().copied().map(ParticipantId::new), local);
            let new = Roster::from_members(after.iter().copied().map(ParticipantId::new), local);

            let delta = old.diff(&new);
            let mut rebuilt: BTreeSet<ParticipantId> = old.iter().collect();
            for departed in &delta.departed {
                rebuilt.remove(departed);
            }
            for joined in &delta.joined {
                rebuilt.insert(*joined);
            }

            prop_assert_eq!(rebuilt, new.iter().collect::<BTreeSet<_>>());
        }
    }
}
