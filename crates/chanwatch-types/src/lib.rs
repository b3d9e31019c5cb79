//! Shared identifier, transition, and event types for chanwatch.
//!
//! This crate holds the value types that cross crate boundaries: member and
//! channel identifiers, the raw transitions delivered by the platform, and
//! the base events emitted by the presence engine. It has no behaviour beyond
//! validation and small accessors, so the daemon and the engine can agree on
//! wire shapes without depending on each other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a channel member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque identifier of the observed channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Error returned when a raw transition cannot be attributed to a member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTransition {
    /// The transition carried no member identifier at all.
    #[error("transition has no member id")]
    MissingMember,

    /// The member identifier was present but empty.
    #[error("transition has an empty member id")]
    EmptyMember,
}

/// One member's location change as reported by the platform.
///
/// A `None` location means the member is not in any channel. The engine
/// reads a transition once and does not retain it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawTransition {
    /// The member whose location changed.
    #[serde(default)]
    pub member_id: Option<MemberId>,
    /// Where the member was before this transition.
    #[serde(default)]
    pub previous: Option<ChannelId>,
    /// Where the member is after this transition.
    #[serde(default)]
    pub next: Option<ChannelId>,
}

impl RawTransition {
    /// Builds a transition for `member` moving from `previous` to `next`.
    pub fn new(
        member: impl Into<MemberId>,
        previous: Option<ChannelId>,
        next: Option<ChannelId>,
    ) -> Self {
        Self {
            member_id: Some(member.into()),
            previous,
            next,
        }
    }

    /// Returns the member id, rejecting missing or empty identifiers.
    pub fn member(&self) -> Result<&MemberId, InvalidTransition> {
        match &self.member_id {
            None => Err(InvalidTransition::MissingMember),
            Some(id) if id.as_str().is_empty() => Err(InvalidTransition::EmptyMember),
            Some(id) => Ok(id),
        }
    }
}

/// Membership size immediately before and after one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counts {
    /// Members present before the transition was applied.
    pub before: usize,
    /// Members present after the transition was applied.
    pub now: usize,
}

impl Counts {
    /// Counts for a transition that moved membership from `before` to `now`.
    pub fn new(before: usize, now: usize) -> Self {
        Self { before, now }
    }

    /// Counts for a transition that left membership untouched.
    pub fn unchanged(count: usize) -> Self {
        Self {
            before: count,
            now: count,
        }
    }
}

/// Topic names for the three base events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A member was actually added.
    Increase,
    /// A member was actually removed.
    Decrease,
    /// Membership size did not change.
    NoChange,
}

impl EventKind {
    /// Returns the canonical label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::NoChange => "no_change",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single event produced for every processed transition.
///
/// `Increase` always carries `now == before + 1` and `Decrease` always
/// carries `now == before - 1`. Anything else is reported as `NoChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "counts", rename_all = "snake_case")]
pub enum BaseEvent {
    Increase(Counts),
    Decrease(Counts),
    NoChange(Counts),
}

impl BaseEvent {
    /// Returns the topic this event is published on.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Increase(_) => EventKind::Increase,
            Self::Decrease(_) => EventKind::Decrease,
            Self::NoChange(_) => EventKind::NoChange,
        }
    }

    /// Returns the counts carried by this event.
    pub fn counts(&self) -> Counts {
        match self {
            Self::Increase(c) | Self::Decrease(c) | Self::NoChange(c) => *c,
        }
    }
}
