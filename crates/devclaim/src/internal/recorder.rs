use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Severity of a recorded event, mirroring the usual Normal/Warning split of
/// machine event feeds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    Normal,
    Warning,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            EventKind::Normal => "Normal",
            EventKind::Warning => "Warning",
        };
        write!(f, "{kind}")
    }
}

/// One recorded occurrence on an object, e.g. a claim handed out for a
/// machine.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub object: String,
    pub kind: EventKind,
    pub reason: String,
    pub message: String,
    pub time: SystemTime,
}

#[derive(Debug, Clone, Copy)]
pub struct EventStoreOptions {
    /// Number of events kept at most; the oldest event is overridden beyond
    /// that.
    pub max_events: usize,
    /// Age at which an event becomes eligible for expiry.
    pub ttl: Duration,
    /// Pause between expiry sweeps of [`EventStore::start`].
    pub resync_interval: Duration,
}

impl Default for EventStoreOptions {
    fn default() -> Self {
        EventStoreOptions {
            max_events: 1000,
            ttl: Duration::from_secs(60 * 60),
            resync_interval: Duration::from_secs(60),
        }
    }
}

/// In-memory log of machine events, bounded both by capacity and by event
/// age.
///
/// Recording and listing work from any task or thread. Expiry only happens
/// inside [`start`](Self::start); a store that is never started simply keeps
/// events until the capacity pushes them out.
pub struct EventStore {
    options: EventStoreOptions,
    events: Mutex<VecDeque<Event>>,
}

impl EventStore {
    /// Creates a store. A zero `max_events` or `resync_interval` falls back
    /// to its default.
    pub fn new(mut options: EventStoreOptions) -> Self {
        let defaults = EventStoreOptions::default();
        if options.max_events == 0 {
            options.max_events = defaults.max_events;
        }
        if options.resync_interval.is_zero() {
            options.resync_interval = defaults.resync_interval;
        }
        EventStore {
            options,
            events: Mutex::new(VecDeque::with_capacity(options.max_events)),
        }
    }

    /// Appends an event stamped with the current time. When the store is
    /// full, the oldest event is dropped to make room.
    pub fn record(
        &self,
        object: impl Into<String>,
        kind: EventKind,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) {
        let event = Event {
            object: object.into(),
            kind,
            reason: reason.into(),
            message: message.into(),
            time: SystemTime::now(),
        };
        let mut events = self.lock_events();
        if events.len() >= self.options.max_events {
            if let Some(oldest) = events.pop_front() {
                log::debug!("Overriding event {oldest:?}");
            }
        }
        events.push_back(event);
    }

    /// Returns a copy of the stored events, oldest first.
    pub fn list_events(&self) -> Vec<Event> {
        self.lock_events().iter().cloned().collect()
    }

    /// Sweeps expired events every resync interval until `token` fires. The
    /// first sweep runs immediately.
    pub async fn start(&self, token: CancellationToken) {
        let mut resync = tokio::time::interval(self.options.resync_interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = resync.tick() => self.remove_expired(SystemTime::now()),
            }
        }
    }

    fn remove_expired(&self, now: SystemTime) {
        let mut events = self.lock_events();
        while let Some(event) = events.front() {
            // Events are appended in time order, so the front is the oldest.
            let expired = match now.duration_since(event.time) {
                Ok(age) => age >= self.options.ttl,
                Err(_) => false,
            };
            if !expired {
                break;
            }
            events.pop_front();
        }
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, VecDeque<Event>> {
        self.events.lock().expect("event store lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_options() -> EventStoreOptions {
        EventStoreOptions {
            max_events: 5,
            ttl: Duration::from_secs(2),
            resync_interval: Duration::from_millis(10),
        }
    }

    fn record_device_event(store: &EventStore, message: impl Into<String>) {
        store.record("machine-1", EventKind::Normal, "Claimed", message);
    }

    #[test]
    fn test_store_starts_empty() {
        let store = EventStore::new(test_options());
        assert!(store.list_events().is_empty());
    }

    #[test]
    fn test_degenerate_options_fall_back_to_defaults() {
        let store = EventStore::new(EventStoreOptions {
            max_events: 0,
            ttl: Duration::ZERO,
            resync_interval: Duration::ZERO,
        });
        assert_eq!(store.options.max_events, 1000);
        assert_eq!(store.options.resync_interval, Duration::from_secs(60));
        // The TTL stays as given; zero means events expire on the next sweep.
        assert!(store.options.ttl.is_zero());

        record_device_event(&store, "claimed device 0");
        record_device_event(&store, "claimed device 1");
        assert_eq!(store.list_events().len(), 2);
    }

    #[test]
    fn test_record_and_list() {
        let store = EventStore::new(test_options());
        store.record("machine-1", EventKind::Warning, "ClaimFailed", "gpu pool exhausted");
        let events = store.list_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object, "machine-1");
        assert_eq!(events[0].kind, EventKind::Warning);
        assert_eq!(events[0].reason, "ClaimFailed");
        assert_eq!(events[0].message, "gpu pool exhausted");
    }

    #[test]
    fn test_full_store_overrides_oldest() {
        let store = EventStore::new(test_options());
        for i in 0..5 {
            record_device_event(&store, format!("claimed device {i}"));
            assert_eq!(store.list_events().len(), i + 1);
        }

        record_device_event(&store, "new event");

        let events = store.list_events();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().take(4).enumerate() {
            assert_eq!(event.message, format!("claimed device {}", i + 1));
        }
        assert_eq!(events[4].message, "new event");
    }

    #[test]
    fn test_expiry_removes_only_old_events() {
        let store = EventStore::new(test_options());
        let now = SystemTime::now();
        {
            let mut events = store.events.lock().unwrap();
            events.push_back(Event {
                object: "machine-1".to_string(),
                kind: EventKind::Normal,
                reason: "Claimed".to_string(),
                message: "old".to_string(),
                time: now - Duration::from_secs(10),
            });
            events.push_back(Event {
                object: "machine-1".to_string(),
                kind: EventKind::Normal,
                reason: "Claimed".to_string(),
                message: "fresh".to_string(),
                time: now,
            });
        }

        store.remove_expired(now);

        let events = store.list_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "fresh");

        // Exactly at the TTL the event expires.
        store.remove_expired(now + Duration::from_secs(2));
        assert!(store.list_events().is_empty());
    }

    #[test]
    fn test_list_returns_copies() {
        let store = EventStore::new(test_options());
        record_device_event(&store, "claimed device 0");

        let mut events = store.list_events();
        events[0].message = "changed".to_string();

        assert_eq!(store.list_events()[0].message, "claimed device 0");
    }

    #[tokio::test]
    async fn test_expiry_loop_stops_on_cancellation() {
        let store = Arc::new(EventStore::new(EventStoreOptions {
            ttl: Duration::ZERO,
            ..test_options()
        }));
        record_device_event(&store, "claimed device 0");

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let store = store.clone();
            let token = token.clone();
            async move { store.start(token).await }
        });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !store.list_events().is_empty() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "recorded event was never expired"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("expiry loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_with_zero_resync_interval() {
        let store = Arc::new(EventStore::new(EventStoreOptions {
            resync_interval: Duration::ZERO,
            ..test_options()
        }));

        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let store = store.clone();
            let token = token.clone();
            async move { store.start(token).await }
        });

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("expiry loop did not stop")
            .unwrap();
    }
}
