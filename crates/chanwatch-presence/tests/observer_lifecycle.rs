use chanwatch_presence::{
    ChannelObserver, LookupError, LookupFailurePolicy, MemberLookup, PresenceError, RunSummary,
};
use chanwatch_types::{ChannelId, Counts, MemberId, RawTransition};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const CHAN: &str = "voice-lobby";

/// Lookup that answers with a fixed member list and counts its invocations.
struct FixedLookup {
    members: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FixedLookup {
    fn new(members: Vec<&'static str>) -> Self {
        Self {
            members,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemberLookup for FixedLookup {
    async fn fetch_current_members(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<MemberId>, LookupError> {
        assert_eq!(channel_id.as_str(), CHAN);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.iter().copied().map(MemberId::from).collect())
    }
}

struct UnreachableLookup;

impl MemberLookup for UnreachableLookup {
    async fn fetch_current_members(
        &self,
        _channel_id: &ChannelId,
    ) -> Result<Vec<MemberId>, LookupError> {
        Err(LookupError::Unavailable("connection refused".to_string()))
    }
}

fn join(member: &str) -> RawTransition {
    RawTransition::new(member, None, Some(ChannelId::from(CHAN)))
}

fn leave(member: &str) -> RawTransition {
    RawTransition::new(member, Some(ChannelId::from(CHAN)), None)
}

#[tokio::test]
async fn start_loads_snapshot_from_lookup() {
    let lookup = FixedLookup::new(vec!["alice", "bob", "alice"]);
    let mut observer = ChannelObserver::new(CHAN);

    let present = observer.start(&lookup).await.expect("start should succeed");

    assert_eq!(present, 2);
    assert!(observer.is_started());
    assert!(observer.is_present(&MemberId::from("bob")));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_runs_lookup_at_most_once() {
    let lookup = FixedLookup::new(vec!["alice"]);
    let mut observer = ChannelObserver::new(CHAN);

    observer.start(&lookup).await.expect("first start");
    let second = observer.start(&lookup).await;

    assert!(matches!(second, Err(PresenceError::AlreadyStarted)));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_on_seeded_observer_is_rejected() {
    let lookup = FixedLookup::new(vec!["alice"]);
    let mut observer = ChannelObserver::with_members(CHAN, ["carol"]);

    let result = observer.start(&lookup).await;

    assert!(matches!(result, Err(PresenceError::AlreadyStarted)));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    assert!(observer.is_present(&MemberId::from("carol")));
}

#[tokio::test]
async fn lookup_failure_fails_start_by_default() {
    let mut observer = ChannelObserver::new(CHAN);

    let result = observer.start(&UnreachableLookup).await;

    assert!(matches!(
        result,
        Err(PresenceError::Lookup(LookupError::Unavailable(_)))
    ));
    assert!(!observer.is_started());
    assert!(matches!(
        observer.process(&join("alice")),
        Err(PresenceError::NotStarted)
    ));
    // The lookup is not retried.
    assert!(matches!(
        observer.start(&FixedLookup::new(vec![])).await,
        Err(PresenceError::AlreadyStarted)
    ));
}

#[tokio::test]
async fn lookup_failure_can_start_empty() {
    let mut observer =
        ChannelObserver::new(CHAN).with_lookup_failure(LookupFailurePolicy::StartEmpty);

    let present = observer
        .start(&UnreachableLookup)
        .await
        .expect("start should fall back to an empty channel");

    assert_eq!(present, 0);
    assert!(observer.is_started());
    let ev = observer.process(&join("alice")).expect("process");
    assert_eq!(ev.counts(), Counts::new(0, 1));
}

#[tokio::test]
async fn run_requires_start() {
    let mut observer = ChannelObserver::new(CHAN);
    let (_tx, rx) = mpsc::channel(4);

    assert!(matches!(
        observer.run(rx).await,
        Err(PresenceError::NotStarted)
    ));
}

#[tokio::test]
async fn run_processes_in_order_and_skips_invalid_transitions() {
    let mut observer = ChannelObserver::with_members(CHAN, ["alice"]);
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    observer.on_change(move |c| sink.lock().unwrap().push(c));

    let (tx, rx) = mpsc::channel(16);
    tx.send(join("bob")).await.unwrap();
    tx.send(RawTransition::default()).await.unwrap();
    tx.send(join("bob")).await.unwrap();
    tx.send(leave("alice")).await.unwrap();
    tx.send(leave("bob")).await.unwrap();
    drop(tx);

    let summary = observer.run(rx).await.expect("run should finish");

    assert_eq!(
        summary,
        RunSummary {
            processed: 4,
            rejected: 1
        }
    );
    assert_eq!(
        *changes.lock().unwrap(),
        vec![Counts::new(1, 2), Counts::new(2, 1), Counts::new(1, 0)]
    );
    assert_eq!(observer.present_count(), 0);
}

#[tokio::test]
async fn transitions_queued_during_start_apply_after_snapshot() {
    let lookup = FixedLookup::new(vec!["alice"]);
    let mut observer = ChannelObserver::new(CHAN);
    let (tx, rx) = mpsc::channel(16);

    // Sent before the snapshot exists; buffered by the channel.
    tx.send(join("bob")).await.unwrap();
    tx.send(join("alice")).await.unwrap();
    drop(tx);

    observer.start(&lookup).await.expect("start");
    observer.run(rx).await.expect("run");

    assert_eq!(observer.present_count(), 2);
}

#[tokio::test]
async fn once_threshold_fires_once_across_a_burst() {
    let mut observer = ChannelObserver::with_members(CHAN, Vec::<MemberId>::new());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    observer.once_threshold_reached(2, move |channel, counts| {
        assert_eq!(channel.as_str(), CHAN);
        assert_eq!(counts, Counts::new(1, 2));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (tx, rx) = mpsc::channel(64);
    for i in 0..20 {
        tx.send(join(&format!("member-{i}"))).await.unwrap();
    }
    drop(tx);
    observer.run(rx).await.expect("run");

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(observer.present_count(), 20);
}

#[tokio::test]
async fn observer_can_run_on_a_spawned_task() {
    let mut observer = ChannelObserver::with_members(CHAN, ["alice"]);
    let emptied = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&emptied);
    observer.on_empty(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(async move {
        observer.run(rx).await.expect("run");
        observer
    });
    tx.send(leave("alice")).await.unwrap();
    drop(tx);

    let observer = task.await.expect("task should not panic");
    assert_eq!(observer.present_count(), 0);
    assert_eq!(emptied.load(Ordering::SeqCst), 1);
}
