//! Membership diffing: turns raw transitions into base events.

use crate::broker::EventBroker;
use crate::classifier::{classify, Transition};
use crate::error::PresenceError;
use crate::membership::MembershipSet;
use chanwatch_types::{BaseEvent, ChannelId, Counts, EventKind, MemberId, RawTransition};
use std::sync::Arc;

/// Applies raw transitions to the membership set of one channel and
/// publishes exactly one base event per accepted transition.
#[derive(Debug)]
pub struct DiffEngine {
    channel_id: ChannelId,
    members: MembershipSet,
    broker: Arc<EventBroker<EventKind, Counts>>,
}

impl DiffEngine {
    pub fn new(
        channel_id: ChannelId,
        members: MembershipSet,
        broker: Arc<EventBroker<EventKind, Counts>>,
    ) -> Self {
        Self {
            channel_id,
            members,
            broker,
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn members(&self) -> &MembershipSet {
        &self.members
    }

    pub fn present_count(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn replace_members(&mut self, members: MembershipSet) {
        self.members = members;
    }

    /// Classifies `transition`, updates membership, and publishes the
    /// resulting event.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::InvalidTransition`] if the transition has no
    /// usable member id. Nothing is mutated or published in that case.
    pub fn process(&mut self, transition: &RawTransition) -> Result<BaseEvent, PresenceError> {
        let (member, event) = self.apply(transition)?;
        let counts = event.counts();

        tracing::debug!(
            channel = %self.channel_id,
            member = %member,
            kind = %event.kind(),
            before = counts.before,
            now = counts.now,
            "processed transition"
        );

        self.broker.publish(event.kind(), &counts);
        Ok(event)
    }

    fn apply<'t>(
        &mut self,
        transition: &'t RawTransition,
    ) -> Result<(&'t MemberId, BaseEvent), PresenceError> {
        let member = transition.member()?;
        let before = self.members.len();

        let event = match classify(
            transition.previous.as_ref(),
            transition.next.as_ref(),
            &self.channel_id,
        ) {
            Transition::Join if self.members.insert(member.clone()) => {
                BaseEvent::Increase(Counts::new(before, self.members.len()))
            }
            Transition::Leave if self.members.remove(member) => {
                BaseEvent::Decrease(Counts::new(before, self.members.len()))
            }
            // Duplicate joins, leaves of unknown members, and unrelated moves.
            _ => BaseEvent::NoChange(Counts::unchanged(before)),
        };
        Ok((member, event))
    }
}
