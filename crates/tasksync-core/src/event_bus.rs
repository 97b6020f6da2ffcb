//! In-memory event log with synchronous fan-out.
//!
//! The [`EventBus`] owns one ordered, bounded buffer of [`Event`]s and the set
//! of registered listeners. Every [`emit`](EventBus::emit) both records the
//! event for replay and hands it to each live listener before returning, so a
//! caller that sees `emit` return knows every listener has been notified.
//!
//! ## Concurrency
//!
//! The buffer, the subscriber set and the pending-dispatch queue sit behind a
//! single mutex. Appending an event takes a snapshot of the subscribers and
//! queues `(event, snapshot)`; delivery drains that queue in append order under
//! a separate dispatch lock, with the state lock released. Consequences:
//!
//! - listeners may call `subscribe`, `unsubscribe`, `events_since` and even
//!   `emit` on the same bus without deadlocking; a nested `emit` is delivered
//!   right after the event currently being dispatched;
//! - a subscriber registered while an event is in flight does not receive
//!   that event, only later ones;
//! - an unsubscribed listener is skipped for every event not yet handed to it.
//!
//! Each bus is independent. Cursors and live tails are not portable across
//! server instances.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};

use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::events::{Event, EventId, EventQuery};

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

struct Subscriber {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener,
}

/// Everything guarded by the state mutex.
struct BusState {
    events: VecDeque<Event>,
    subscribers: Vec<Arc<Subscriber>>,
    /// Appended events awaiting delivery, each with its subscriber snapshot.
    pending: VecDeque<(Event, Vec<Arc<Subscriber>>)>,
    next_id: EventId,
    next_subscriber: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl BusState {
    fn append(
        &mut self,
        resource: String,
        action: String,
        data: JsonValue,
        capacity: usize,
    ) -> Event {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);

        let id = self.next_id;
        self.next_id = id.next();

        let event = Event {
            id,
            resource,
            action,
            timestamp,
            data,
        };
        self.events.push_back(event.clone());
        while self.events.len() > capacity {
            self.events.pop_front();
        }
        event
    }
}

struct BusInner {
    capacity: usize,
    state: Mutex<BusState>,
    dispatch: Mutex<()>,
    /// Thread currently draining the pending queue, if any.
    dispatcher: Mutex<Option<ThreadId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BusInner {
    /// Deliver queued events until the queue is empty.
    ///
    /// A nested call from a listener running on the dispatching thread returns
    /// immediately; the outer loop picks up whatever it queued.
    fn drain_pending(&self) {
        let current = thread::current().id();
        if *lock(&self.dispatcher) == Some(current) {
            return;
        }

        let _dispatch = lock(&self.dispatch);
        *lock(&self.dispatcher) = Some(current);
        loop {
            let next = lock(&self.state).pending.pop_front();
            let Some((event, subscribers)) = next else {
                break;
            };
            deliver(&event, &subscribers);
        }
        *lock(&self.dispatcher) = None;
    }
}

fn deliver(event: &Event, subscribers: &[Arc<Subscriber>]) {
    for subscriber in subscribers {
        if !subscriber.active.load(Ordering::Acquire) {
            continue;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| (subscriber.listener)(event)));
        if outcome.is_err() {
            warn!(
                subsystem = "events",
                component = "event_bus",
                op = "dispatch",
                event_id = %event.id,
                subscriber_id = subscriber.id,
                "Listener panicked; delivery continues with remaining listeners"
            );
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Ordered, bounded, replayable event log with live fan-out.
///
/// Cloning is cheap and every clone refers to the same log. Construct one per
/// server (or per test) and inject it where events are produced or consumed.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus retaining at most `capacity` events (minimum 1).
    ///
    /// Production uses [`defaults::EVENT_LOG_CAPACITY`](crate::defaults::EVENT_LOG_CAPACITY).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                state: Mutex::new(BusState {
                    events: VecDeque::with_capacity(capacity.clamp(1, 4096)),
                    subscribers: Vec::new(),
                    pending: VecDeque::new(),
                    next_id: EventId::FIRST,
                    next_subscriber: 1,
                    last_timestamp: None,
                }),
                dispatch: Mutex::new(()),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Record an event and deliver it to every registered listener.
    ///
    /// Returns the stored event once delivery has finished. Never fails;
    /// evicting the oldest event at capacity is routine.
    pub fn emit(
        &self,
        resource: impl Into<String>,
        action: impl Into<String>,
        data: JsonValue,
    ) -> Event {
        let (event, subscriber_count) = {
            let mut state = lock(&self.inner.state);
            let event = state.append(resource.into(), action.into(), data, self.inner.capacity);
            let snapshot = state.subscribers.clone();
            let count = snapshot.len();
            if count > 0 {
                state.pending.push_back((event.clone(), snapshot));
            }
            (event, count)
        };

        trace!(
            subsystem = "events",
            component = "event_bus",
            op = "emit",
            event_id = %event.id,
            event_type = %event.event_type(),
            subscriber_count,
            "EventBus emit"
        );

        self.inner.drain_pending();
        event
    }

    /// Register a listener invoked with every subsequently emitted event.
    ///
    /// The returned [`Subscription`] unregisters the listener when
    /// [`unsubscribe`](Subscription::unsubscribe) is called or when it is
    /// dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut state = lock(&self.inner.state);
        self.register(&mut state, Box::new(listener))
    }

    fn register(&self, state: &mut BusState, listener: Listener) -> Subscription {
        let id = state.next_subscriber;
        state.next_subscriber += 1;

        let active = Arc::new(AtomicBool::new(true));
        state.subscribers.push(Arc::new(Subscriber {
            id,
            active: Arc::clone(&active),
            listener,
        }));

        debug!(
            subsystem = "events",
            component = "event_bus",
            op = "subscribe",
            subscriber_id = id,
            subscriber_count = state.subscribers.len(),
            "Listener registered"
        );

        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
            active,
        }
    }

    /// Retained events matching `query`, ascending by id.
    pub fn events_since(&self, query: &EventQuery) -> Vec<Event> {
        let state = lock(&self.inner.state);
        query.select(&state.events)
    }

    /// Backlog for `query` plus a live stream of everything emitted afterwards.
    ///
    /// The backlog snapshot and the listener registration happen under the
    /// same lock, so no event falls between them or appears in both.
    pub fn tail(&self, query: &EventQuery) -> EventTail {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.inner.state);
        let backlog = query.select(&state.events);
        let subscription = self.register(
            &mut state,
            Box::new(move |event: &Event| {
                // Receiver gone means the stream is being torn down.
                let _ = tx.send(event.clone());
            }),
        );
        drop(state);

        EventTail {
            backlog,
            live: LiveEvents { rx, subscription },
        }
    }

    /// Drop every retained event. Listeners and the id sequence are untouched.
    pub fn reset(&self) {
        let mut state = lock(&self.inner.state);
        let cleared = state.events.len();
        state.events.clear();
        debug!(
            subsystem = "events",
            component = "event_bus",
            op = "reset",
            cleared,
            "Event log cleared"
        );
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.state).subscribers.len()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        lock(&self.inner.state).events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Id of the newest retained event.
    pub fn latest_id(&self) -> Option<EventId> {
        lock(&self.inner.state).events.back().map(|e| e.id)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("EventBus")
            .field("capacity", &self.inner.capacity)
            .field("events", &state.events.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Registration handle returned by [`EventBus::subscribe`].
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Unregister the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut state = lock(&inner.state);
        state.subscribers.retain(|s| s.id != self.id);
        debug!(
            subsystem = "events",
            component = "event_bus",
            op = "unsubscribe",
            subscriber_id = self.id,
            subscriber_count = state.subscribers.len(),
            "Listener removed"
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ============================================================================
// Live tail
// ============================================================================

/// Result of [`EventBus::tail`].
#[derive(Debug)]
pub struct EventTail {
    /// Retained events selected by the query at registration time.
    pub backlog: Vec<Event>,
    /// Events emitted after registration.
    pub live: LiveEvents,
}

/// Stream of live events bound to a registration.
///
/// Dropping the stream unsubscribes, which is how a closed client connection
/// releases its listener.
///
/// The channel is unbounded: `emit` never waits on a reader, so events for a
/// consumer that stays registered but stops polling queue up in memory until
/// it reads them or drops the stream.
#[derive(Debug)]
pub struct LiveEvents {
    rx: mpsc::UnboundedReceiver<Event>,
    subscription: Subscription,
}

impl LiveEvents {
    /// Next live event; `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Stream for LiveEvents {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

// ============================================================================
// Tests
// ============================================================================
