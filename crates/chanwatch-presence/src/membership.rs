//! The set of members currently believed present in the observed channel.

use chanwatch_types::MemberId;
use std::collections::HashSet;

/// Distinct member ids present in the channel. Insertion order is not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSet {
    members: HashSet<MemberId>,
}

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member. Returns `false` if the member was already present.
    pub fn insert(&mut self, member: MemberId) -> bool {
        self.members.insert(member)
    }

    /// Removes a member. Returns `false` if the member was not present.
    pub fn remove(&mut self, member: &MemberId) -> bool {
        self.members.remove(member)
    }

    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberId> {
        self.members.iter()
    }
}

impl FromIterator<MemberId> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = MemberId>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}
