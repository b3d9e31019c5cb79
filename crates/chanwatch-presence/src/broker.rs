//! Topic-based publish/subscribe hub.
//!
//! Handlers are registered per topic and invoked synchronously, in
//! subscription order, on every publish to that topic. Nothing is buffered:
//! a handler only sees publishes that start after it was registered.
//!
//! Each publish delivers to the handler list as it stood when the publish
//! began. The registry lock is released before any handler runs, so a
//! handler may subscribe or unsubscribe (including itself) without
//! deadlocking; such changes apply from the next publish on.
//!
//! Handler panics are not caught. A panicking handler unwinds through
//! `publish` and the handlers after it on that publish are not invoked.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registration<P> {
    id: SubscriptionId,
    handler: Handler<P>,
}

/// Publish/subscribe hub keyed by topic `K`, delivering payloads of type `P`.
pub struct EventBroker<K, P> {
    topics: Mutex<HashMap<K, Vec<Registration<P>>>>,
    next_id: AtomicU64,
}

impl<K, P> EventBroker<K, P>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `handler` on `topic`.
    pub fn subscribe<F>(&self, topic: K, handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe_all(&[topic], handler)
    }

    /// Registers one handler on several topics under a single handle.
    ///
    /// Unsubscribing the returned id removes the handler from every topic.
    pub fn subscribe_all<F>(&self, topics: &[K], handler: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<P> = Arc::new(handler);
        let mut registry = self.registry();
        for topic in topics {
            registry.entry(*topic).or_default().push(Registration {
                id,
                handler: Arc::clone(&handler),
            });
        }
        id
    }

    /// Removes a subscription from every topic it was registered on.
    ///
    /// Returns `false` if the id was unknown or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let mut removed = false;
        for registrations in registry.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        removed
    }

    /// Delivers `payload` to every handler currently registered on `topic`.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, topic: K, payload: &P) -> usize {
        let snapshot: Vec<Handler<P>> = self
            .registry()
            .get(&topic)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|r| Arc::clone(&r.handler))
                    .collect()
            })
            .unwrap_or_default();

        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    /// Number of handlers registered on `topic`.
    pub fn handler_count(&self, topic: K) -> usize {
        self.registry().get(&topic).map_or(0, Vec::len)
    }

    // Handlers never run under this lock, so a poisoned guard can only come
    // from a panic inside the registry bookkeeping itself.
    fn registry(&self) -> MutexGuard<'_, HashMap<K, Vec<Registration<P>>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, P> Default for EventBroker<K, P>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> fmt::Debug for EventBroker<K, P>
where
    K: Copy + Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        let mut map = f.debug_map();
        for (topic, registrations) in registry.iter() {
            map.entry(topic, &registrations.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Topic {
        A,
        B,
    }

    fn recorder() -> Arc<StdMutex<Vec<String>>> {
        Arc::new(StdMutex::new(Vec::new()))
    }

    #[test]
    fn handlers_fire_in_subscription_order() {
        let broker: EventBroker<Topic, u32> = EventBroker::new();
        let seen = recorder();
        let log = Arc::clone(&seen);

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            broker.subscribe(Topic::A, move |n: &u32| {
                log.lock().unwrap().push(format!("{name}:{n}"));
            });
        }

        assert_eq!(broker.publish(Topic::A, &7), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:7", "second:7", "third:7"]
        );
    }

    #[test]
    fn publish_only_reaches_its_topic() {
        let broker: EventBroker<Topic, u32> = EventBroker::new();
        let seen = recorder();
        let log = Arc::clone(&seen);
        broker.subscribe(Topic::B, move |n: &u32| {
            log.lock().unwrap().push(n.to_string());
        });

        assert_eq!(broker.publish(Topic::A, &1), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn late_subscriber_does_not_see_earlier_publish() {
        let broker: EventBroker<Topic, u32> = EventBroker::new();
        broker.publish(Topic::A, &1);

        let seen = recorder();
        let log = Arc::clone(&seen);
        broker.subscribe(Topic::A, move |n: &u32| {
            log.lock().unwrap().push(n.to_string());
        });
        broker.publish(Topic::A, &2);

        assert_eq!(*seen.lock().unwrap(), vec!["2"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let broker: EventBroker<Topic, u32> = EventBroker::new();
        let seen = recorder();
        let log = Arc::clone(&seen);
        let id = broker.subscribe(Topic::A, move |n: &u32| {
            log.lock().unwrap().push(n.to_string());
        });

        broker.publish(Topic::A, &1);
        assert!(broker.unsubscribe(id));
        assert!(!broker.unsubscribe(id));
        broker.publish(Topic::A, &2);

        assert_eq!(*seen.lock().unwrap(), vec!["1"]);
        assert_eq!(broker.handler_count(Topic::A), 0);
    }

    #[test]
    fn subscribe_all_shares_one_handle() {
        let broker: EventBroker<Topic, u32> = EventBroker::new();
        let seen = recorder();
        let log = Arc::clone(&seen);
        let id = broker.subscribe_all(&[Topic::A, Topic::B], move |n: &u32| {
            log.lock().unwrap().push(n.to_string());
        });

        broker.publish(Topic::A, &1);
        broker.publish(Topic::B, &2);
        assert!(broker.unsubscribe(id));
        broker.publish(Topic::A, &3);
        broker.publish(Topic::B, &4);

        assert_eq!(*seen.lock().unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn unsubscribe_during_publish_applies_to_next_publish() {
        let broker: Arc<EventBroker<Topic, u32>> = Arc::new(EventBroker::new());
        let seen = recorder();
        let log = Arc::clone(&seen);

        let victim = {
            let log = Arc::clone(&log);
            broker.subscribe(Topic::A, move |n: &u32| {
                log.lock().unwrap().push(format!("victim:{n}"));
            })
        };
        // Removes the victim while the first publish is still in flight.
        let weak = Arc::downgrade(&broker);
        broker.subscribe(Topic::A, move |_: &u32| {
            if let Some(b) = weak.upgrade() {
                b.unsubscribe(victim);
            }
        });
        {
            let log = Arc::clone(&log);
            broker.subscribe(Topic::A, move |n: &u32| {
                log.lock().unwrap().push(format!("tail:{n}"));
            });
        }

        broker.publish(Topic::A, &1);
        broker.publish(Topic::A, &2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["victim:1", "tail:1", "tail:2"]
        );
    }

    #[test]
    fn handler_may_subscribe_during_publish() {
        let broker: Arc<EventBroker<Topic, u32>> = Arc::new(EventBroker::new());
        let seen = recorder();
        let log = Arc::clone(&seen);
        let weak = Arc::downgrade(&broker);

        broker.subscribe(Topic::A, move |n: &u32| {
            if *n == 1 {
                if let Some(b) = weak.upgrade() {
                    let log = Arc::clone(&log);
                    b.subscribe(Topic::A, move |n: &u32| {
                        log.lock().unwrap().push(format!("added:{n}"));
                    });
                }
            }
        });

        assert_eq!(broker.publish(Topic::A, &1), 1);
        assert_eq!(broker.publish(Topic::A, &2), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["added:2"]);
    }

    #[test]
    fn handler_panic_propagates_to_publisher() {
        let broker: EventBroker<Topic, u32> = EventBroker::new();
        broker.subscribe(Topic::A, |_: &u32| panic!("handler failure"));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            broker.publish(Topic::A, &1);
        }));
        assert!(result.is_err());
        // The registry stays usable afterwards.
        assert_eq!(broker.handler_count(Topic::A), 1);
    }
}
