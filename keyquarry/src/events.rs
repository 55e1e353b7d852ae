//! The event bus: fan-out of typed key events to N subscribers over
//! bounded queues, with per-subscriber send timeouts and filter-matched
//! delivery. No direct teacher analogue; built on `tokio::sync::mpsc`
//! per-subscriber channels with a bounded send timeout, the same
//! bounded-queue-plus-timeout shape `server.rs` uses for its own
//! shutdown signaling via `tokio_util::sync::CancellationToken`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use serde_derive::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Closed set of state transitions the kernel can emit. Exactly one per
/// accepted state change; `Accessed` additionally fires on read-only
/// touches that use the entry (`Get`/`Pop`/`Inspect(include_value)`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Expired,
    Locked,
    Unlocked,
    Expunged,
    Accessed,
    LifespanSet,
    LifespanRenewed,
}

/// A single published transition. `value` is only populated for the
/// narrower `WatchKeyValue` channel, which captures the value snapshot
/// under the entry mutex at publish time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub key: String,
    pub client_id: String,
    pub timestamp: SystemTime,
    pub version: u64,
    pub value: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub hash: Option<u64>,
}

/// {key names, event kinds, client ids} — an event is delivered iff it
/// matches every non-empty axis. `with_values` additionally opts a
/// subscriber into the value-bearing `WatchKeyValue` channel; subscribers
/// that leave it false never see `value`/`content_type`/`hash`, even
/// though the publisher captured them.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub keys: HashSet<String>,
    pub kinds: HashSet<EventKind>,
    pub client_ids: HashSet<String>,
    pub with_values: bool,
}

impl Filter {
    pub fn matches(&self, event: &Event) -> bool {
        (self.keys.is_empty() || self.keys.contains(&event.key))
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && (self.client_ids.is_empty() || self.client_ids.contains(&event.client_id))
    }
}

struct Subscriber {
    id: u64,
    filter: Filter,
    sender: mpsc::Sender<Event>,
}

/// Publisher-side fan-out structure: subscriber id -> bounded queue.
pub struct Bus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer_size: usize,
    send_timeout: Duration,
    dropped: AtomicU64,
}

/// A live subscription; dropping it unregisters the receiver side from
/// future publishes but does not itself close the channel (the bus does
/// that when `unsubscribe` is called, or implicitly once the sender side
/// is gone).
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Event>,
}

impl Bus {
    pub fn new(buffer_size: usize, send_timeout: Duration) -> Self {
        Bus {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
            send_timeout,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, filter: Filter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.buffer_size);
        self.subscribers.lock().unwrap().push(Subscriber { id, filter, sender });
        Subscription { id, receiver }
    }

    /// Drains and closes the subscriber's queue; in-flight publishers
    /// observe the closed channel and drop silently.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().retain(|s| s.id != id);
    }

    /// Non-blocking attempt per subscriber, bounded by `send_timeout`.
    /// Never holds the entry mutex — callers must have already released
    /// it and pass a fully pre-computed `Event`. Subscribers that didn't
    /// opt into `with_values` receive the event with its value snapshot
    /// stripped back out.
    pub async fn publish(&self, event: Event) {
        let targets: Vec<(u64, mpsc::Sender<Event>, bool)> = {
            let subs = self.subscribers.lock().unwrap();
            subs.iter()
                .filter(|s| s.filter.matches(&event))
                .map(|s| (s.id, s.sender.clone(), s.filter.with_values))
                .collect()
        };
        for (_, sender, with_values) in targets {
            let payload = if with_values {
                event.clone()
            } else {
                Event { value: None, content_type: None, hash: None, ..event.clone() }
            };
            let send = sender.send(payload);
            if timeout(self.send_timeout, send).await.is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(kind: EventKind, key: &str) -> Event {
        Event {
            kind,
            key: key.to_string(),
            client_id: "c1".to_string(),
            timestamp: SystemTime::now(),
            version: 1,
            value: None,
            content_type: None,
            hash: None,
        }
    }

    fn sample_event_with_value(kind: EventKind, key: &str, value: &[u8]) -> Event {
        Event {
            value: Some(value.to_vec()),
            content_type: Some("text/plain".to_string()),
            hash: Some(1),
            ..sample_event(kind, key)
        }
    }

    #[tokio::test]
    async fn delivers_to_matching_subscriber() {
        let bus = Bus::new(8, Duration::from_millis(50));
        let mut sub = bus.subscribe(Filter::default());
        bus.publish(sample_event(EventKind::Created, "foo")).await;
        let got = sub.receiver.recv().await.unwrap();
        assert_eq!(got.key, "foo");
    }

    #[tokio::test]
    async fn filter_excludes_non_matching_key() {
        let bus = Bus::new(8, Duration::from_millis(50));
        let mut filter = Filter::default();
        filter.keys.insert("only-this".to_string());
        let mut sub = bus.subscribe(filter);
        bus.publish(sample_event(EventKind::Created, "other")).await;
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = Bus::new(8, Duration::from_millis(50));
        let sub = bus.subscribe(Filter::default());
        bus.unsubscribe(sub.id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn plain_watch_never_sees_values() {
        let bus = Bus::new(8, Duration::from_millis(50));
        let mut sub = bus.subscribe(Filter::default());
        bus.publish(sample_event_with_value(EventKind::Updated, "foo", b"bar")).await;
        let got = sub.receiver.recv().await.unwrap();
        assert!(got.value.is_none());
        assert!(got.content_type.is_none());
        assert!(got.hash.is_none());
    }

    #[tokio::test]
    async fn watch_key_value_channel_carries_the_snapshot() {
        let bus = Bus::new(8, Duration::from_millis(50));
        let mut filter = Filter::default();
        filter.keys.insert("foo".to_string());
        filter.with_values = true;
        let mut sub = bus.subscribe(filter);
        bus.publish(sample_event_with_value(EventKind::Updated, "foo", b"bar")).await;
        let got = sub.receiver.recv().await.unwrap();
        assert_eq!(got.value, Some(b"bar".to_vec()));
        assert_eq!(got.hash, Some(1));
    }
}
