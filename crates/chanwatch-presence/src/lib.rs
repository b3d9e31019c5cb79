//! Channel presence observation for chanwatch.
//!
//! Tracks who is present in one channel from a stream of raw location
//! transitions and turns that stream into classified events: membership
//! increased, decreased, or unchanged, plus derived edge-triggered
//! notifications for the channel becoming empty or non-empty and for
//! crossing a size threshold.
//!
//! # Pipeline
//!
//! ```text
//! RawTransition ─▶ classify ─▶ MembershipSet ─▶ BaseEvent ─▶ EventBroker ─▶ subscriptions
//! ```
//!
//! - [`classify`] decides whether a transition is a join, a leave, or
//!   unrelated to the observed channel.
//! - [`DiffEngine`] applies it to the [`MembershipSet`] and publishes one
//!   base event per transition.
//! - [`ChannelObserver`] owns the engine, performs the initial
//!   [`MemberLookup`], and exposes the derived subscriptions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chanwatch_presence::ChannelObserver;
//!
//! let mut observer = ChannelObserver::with_members("voice-1", ["u1"]);
//! observer.on_threshold_reached(2, |channel, counts| {
//!     tracing::info!(%channel, now = counts.now, "channel is busy");
//! });
//! observer.run(transitions).await?;
//! ```

mod broker;
mod classifier;
mod engine;
mod error;
mod lookup;
mod membership;
mod observer;

pub use broker::{EventBroker, SubscriptionId};
pub use classifier::{classify, Transition};
pub use engine::DiffEngine;
pub use error::{LookupError, PresenceError};
pub use lookup::MemberLookup;
pub use membership::MembershipSet;
pub use observer::{ChannelObserver, LookupFailurePolicy, RunSummary};
