//! Classification of raw location changes relative to the observed channel.

use chanwatch_types::ChannelId;

/// What a raw transition means for the observed channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The member moved into the observed channel.
    Join,
    /// The member moved out of the observed channel.
    Leave,
    /// The member's location did not change, or the change does not touch
    /// the observed channel.
    Irrelevant,
}

/// Classifies a move from `previous` to `next` against `observed`.
///
/// A transition whose locations are equal is `Irrelevant`, even when both
/// name the observed channel: changes to other member state inside the
/// channel are not membership changes.
///
/// Join is checked before Leave. Both conditions can only hold when
/// `previous == next == observed`, which is already `Irrelevant`, so the
/// precedence never decides an outcome in practice.
pub fn classify(
    previous: Option<&ChannelId>,
    next: Option<&ChannelId>,
    observed: &ChannelId,
) -> Transition {
    if previous == next {
        return Transition::Irrelevant;
    }
    if next == Some(observed) {
        return Transition::Join;
    }
    if previous == Some(observed) {
        return Transition::Leave;
    }
    Transition::Irrelevant
}
