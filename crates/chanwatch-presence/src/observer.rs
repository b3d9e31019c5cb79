//! The channel observer: lifecycle, transition intake, and derived
//! subscriptions.
//!
//! Every derived subscription is a predicate wrapped around one or two base
//! topics on the observer's [`EventBroker`]:
//!
//! | Subscription | Topic(s) | Fires when |
//! |---|---|---|
//! | `on_increased` | increase | always |
//! | `on_decreased` | decrease | always |
//! | `on_nothing_changed` | no_change | always |
//! | `on_change` | increase, decrease | always |
//! | `on_empty` | decrease | `now == 0 && before > 0` |
//! | `on_not_empty` | increase | `before == 0 && now > 0` |
//! | `on_threshold_reached(t)` | increase | `now >= t` |
//! | `on_threshold_left(t)` | decrease | `now < t` |
//! | `once_threshold_reached(t)` | increase | `now >= t`, at most once |
//! | `once_threshold_left(t)` | decrease | `now < t`, at most once |

use crate::broker::{EventBroker, SubscriptionId};
use crate::engine::DiffEngine;
use crate::error::PresenceError;
use crate::lookup::MemberLookup;
use crate::membership::MembershipSet;
use chanwatch_types::{BaseEvent, ChannelId, Counts, EventKind, MemberId, RawTransition};
use serde::Deserialize;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::mpsc;

/// What `start` does when the initial member lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    /// Return the error and refuse to process transitions.
    #[default]
    Fail,
    /// Log a warning and observe starting from an empty channel.
    StartEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Waiting for `start` to load the initial snapshot.
    Pending,
    /// `start` was attempted and failed under [`LookupFailurePolicy::Fail`].
    Failed,
    Ready,
}

/// Totals reported by [`ChannelObserver::run`] once its source closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub rejected: usize,
}

/// Observes the membership of a single channel.
///
/// Transitions are processed one at a time through `&mut self`, so a
/// handler can never re-enter processing while an event is being delivered.
/// Subscriptions only need `&self` and may be added or removed at any time,
/// including from inside a handler.
#[derive(Debug)]
pub struct ChannelObserver {
    engine: DiffEngine,
    broker: Arc<EventBroker<EventKind, Counts>>,
    lifecycle: Lifecycle,
    lookup_failure: LookupFailurePolicy,
}

impl ChannelObserver {
    /// Creates an observer that must be started with a member lookup before
    /// it accepts transitions.
    pub fn new(channel_id: impl Into<ChannelId>) -> Self {
        Self::build(channel_id.into(), MembershipSet::new(), Lifecycle::Pending)
    }

    /// Creates an observer pre-seeded with the given members, ready to
    /// process transitions without a lookup.
    pub fn with_members<I>(channel_id: impl Into<ChannelId>, members: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MemberId>,
    {
        let members = members.into_iter().map(Into::<MemberId>::into).collect();
        Self::build(channel_id.into(), members, Lifecycle::Ready)
    }

    fn build(channel_id: ChannelId, members: MembershipSet, lifecycle: Lifecycle) -> Self {
        let broker = Arc::new(EventBroker::new());
        Self {
            engine: DiffEngine::new(channel_id, members, Arc::clone(&broker)),
            broker,
            lifecycle,
            lookup_failure: LookupFailurePolicy::default(),
        }
    }

    /// Sets the policy applied when the initial lookup fails.
    pub fn with_lookup_failure(mut self, policy: LookupFailurePolicy) -> Self {
        self.lookup_failure = policy;
        self
    }

    pub fn channel_id(&self) -> &ChannelId {
        self.engine.channel_id()
    }

    /// Number of distinct members currently present.
    pub fn present_count(&self) -> usize {
        self.engine.present_count()
    }

    pub fn is_present(&self, member: &MemberId) -> bool {
        self.engine.members().contains(member)
    }

    /// Snapshot of the members currently present, in no particular order.
    pub fn members(&self) -> Vec<MemberId> {
        self.engine.members().iter().cloned().collect()
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    /// Loads the initial membership from `lookup`.
    ///
    /// Must complete before any transition is processed. The lookup runs at
    /// most once per observer; a second call, or a call on a pre-seeded
    /// observer, fails with [`PresenceError::AlreadyStarted`].
    ///
    /// Returns the number of members present after the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Lookup`] if the lookup fails and the policy
    /// is [`LookupFailurePolicy::Fail`]. The observer then never becomes
    /// ready.
    pub async fn start<L>(&mut self, lookup: &L) -> Result<usize, PresenceError>
    where
        L: MemberLookup,
    {
        if self.lifecycle != Lifecycle::Pending {
            return Err(PresenceError::AlreadyStarted);
        }

        let fetched = lookup.fetch_current_members(self.channel_id()).await;
        match fetched {
            Ok(members) => {
                self.engine.replace_members(members.into_iter().collect());
            }
            Err(e) if self.lookup_failure == LookupFailurePolicy::StartEmpty => {
                tracing::warn!(
                    channel = %self.channel_id(),
                    error = %e,
                    "initial member lookup failed, observing from an empty channel"
                );
                self.engine.replace_members(MembershipSet::new());
            }
            Err(e) => {
                self.lifecycle = Lifecycle::Failed;
                return Err(e.into());
            }
        }

        self.lifecycle = Lifecycle::Ready;
        tracing::info!(
            channel = %self.channel_id(),
            present = self.present_count(),
            "channel observer started"
        );
        Ok(self.present_count())
    }

    /// Processes one raw transition and delivers the resulting event to all
    /// current subscribers before returning.
    ///
    /// # Errors
    ///
    /// - [`PresenceError::NotStarted`] if the observer awaits `start`.
    /// - [`PresenceError::InvalidTransition`] if the transition has no member.
    pub fn process(&mut self, transition: &RawTransition) -> Result<BaseEvent, PresenceError> {
        self.ensure_ready()?;
        self.engine.process(transition)
    }

    /// Consumes transitions from `transitions` until the sender side closes.
    ///
    /// Invalid transitions are logged and skipped.
    pub async fn run(
        &mut self,
        mut transitions: mpsc::Receiver<RawTransition>,
    ) -> Result<RunSummary, PresenceError> {
        self.ensure_ready()?;
        let mut summary = RunSummary::default();

        while let Some(transition) = transitions.recv().await {
            match self.engine.process(&transition) {
                Ok(_) => summary.processed += 1,
                Err(PresenceError::InvalidTransition(reason)) => {
                    tracing::warn!(
                        channel = %self.channel_id(),
                        %reason,
                        "rejected raw transition"
                    );
                    summary.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            channel = %self.channel_id(),
            processed = summary.processed,
            rejected = summary.rejected,
            "transition source closed"
        );
        Ok(summary)
    }

    fn ensure_ready(&self) -> Result<(), PresenceError> {
        match self.lifecycle {
            Lifecycle::Ready => Ok(()),
            Lifecycle::Pending | Lifecycle::Failed => Err(PresenceError::NotStarted),
        }
    }

    /// Removes any subscription returned by this observer.
    ///
    /// Returns `false` if it was already removed (including a once-variant
    /// that has fired).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.broker.unsubscribe(id)
    }

    // ── Base subscriptions ──────────────────────────────────────────

    pub fn on_increased<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Counts) + Send + Sync + 'static,
    {
        self.broker
            .subscribe(EventKind::Increase, move |c: &Counts| callback(*c))
    }

    pub fn on_decreased<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Counts) + Send + Sync + 'static,
    {
        self.broker
            .subscribe(EventKind::Decrease, move |c: &Counts| callback(*c))
    }

    pub fn on_nothing_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Counts) + Send + Sync + 'static,
    {
        self.broker
            .subscribe(EventKind::NoChange, move |c: &Counts| callback(*c))
    }

    /// Fires on every increase and decrease under one subscription handle.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Counts) + Send + Sync + 'static,
    {
        self.broker.subscribe_all(
            &[EventKind::Increase, EventKind::Decrease],
            move |c: &Counts| callback(*c),
        )
    }

    // ── Edge-triggered subscriptions ────────────────────────────────

    /// Fires when the last member leaves.
    pub fn on_empty<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Counts) + Send + Sync + 'static,
    {
        self.broker.subscribe(EventKind::Decrease, move |c: &Counts| {
            if c.now == 0 && c.before > 0 {
                callback(*c);
            }
        })
    }

    /// Fires when the first member joins an empty channel.
    pub fn on_not_empty<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Counts) + Send + Sync + 'static,
    {
        self.broker.subscribe(EventKind::Increase, move |c: &Counts| {
            if c.before == 0 && c.now > 0 {
                callback(*c);
            }
        })
    }

    /// Fires on every increase that leaves at least `threshold` members.
    pub fn on_threshold_reached<F>(&self, threshold: usize, callback: F) -> SubscriptionId
    where
        F: Fn(&ChannelId, Counts) + Send + Sync + 'static,
    {
        let channel = self.channel_id().clone();
        self.broker.subscribe(EventKind::Increase, move |c: &Counts| {
            if reached(threshold, c) {
                callback(&channel, *c);
            }
        })
    }

    /// Fires on every decrease that leaves fewer than `threshold` members.
    pub fn on_threshold_left<F>(&self, threshold: usize, callback: F) -> SubscriptionId
    where
        F: Fn(&ChannelId, Counts) + Send + Sync + 'static,
    {
        let channel = self.channel_id().clone();
        self.broker.subscribe(EventKind::Decrease, move |c: &Counts| {
            if left(threshold, c) {
                callback(&channel, *c);
            }
        })
    }

    /// Like [`on_threshold_reached`](Self::on_threshold_reached) but fires
    /// at most once, then removes itself.
    pub fn once_threshold_reached<F>(&self, threshold: usize, callback: F) -> SubscriptionId
    where
        F: FnOnce(&ChannelId, Counts) + Send + 'static,
    {
        self.subscribe_once(EventKind::Increase, move |c| reached(threshold, c), callback)
    }

    /// Like [`on_threshold_left`](Self::on_threshold_left) but fires at most
    /// once, then removes itself.
    pub fn once_threshold_left<F>(&self, threshold: usize, callback: F) -> SubscriptionId
    where
        F: FnOnce(&ChannelId, Counts) + Send + 'static,
    {
        self.subscribe_once(EventKind::Decrease, move |c| left(threshold, c), callback)
    }

    // The callback is taken out of its slot by the first delivery that
    // satisfies the predicate, and the subscription is removed before the
    // callback runs. Later deliveries find the slot empty.
    fn subscribe_once<P, F>(&self, topic: EventKind, predicate: P, callback: F) -> SubscriptionId
    where
        P: Fn(&Counts) -> bool + Send + Sync + 'static,
        F: FnOnce(&ChannelId, Counts) + Send + 'static,
    {
        let channel = self.channel_id().clone();
        let broker = Arc::downgrade(&self.broker);
        let own_id: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());
        let slot = Mutex::new(Some(callback));

        let handle = Arc::clone(&own_id);
        let id = self.broker.subscribe(topic, move |c: &Counts| {
            if !predicate(c) {
                return;
            }
            let Some(callback) = slot.lock().unwrap_or_else(PoisonError::into_inner).take()
            else {
                return;
            };
            if let (Some(broker), Some(id)) = (broker.upgrade(), handle.get()) {
                broker.unsubscribe(*id);
            }
            callback(&channel, *c);
        });

        // The cell is fresh and only set here, so this cannot fail.
        let _ = own_id.set(id);
        id
    }
}

fn reached(threshold: usize, counts: &Counts) -> bool {
    counts.now >= threshold
}

fn left(threshold: usize, counts: &Counts) -> bool {
    counts.now < threshold
}
