//! Error types for the presence engine.

use chanwatch_types::InvalidTransition;

/// Errors that can occur while observing a channel.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The transition could not be attributed to a member. No event was emitted.
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] InvalidTransition),

    /// The observer is still waiting for its initial membership snapshot.
    #[error("observer has not been started")]
    NotStarted,

    /// `start` was already attempted, or the observer was pre-seeded.
    #[error("observer start was already attempted")]
    AlreadyStarted,

    /// The initial member lookup failed.
    #[error("initial member lookup failed: {0}")]
    Lookup(#[from] LookupError),
}

/// Errors reported by a [`MemberLookup`](crate::MemberLookup) implementation.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The platform could not be queried.
    #[error("member lookup unavailable: {0}")]
    Unavailable(String),

    /// The platform answered with something that is not a member list.
    #[error("member lookup returned malformed data: {0}")]
    Malformed(String),
}
