//! In-process event bus: lifecycle events fanned out to independent consumers.
//!
//! # Delivery policy
//!
//! Every subscription owns a bounded queue. [`EventBus::publish`] never waits:
//! when a subscriber's queue is full the event is dropped *for that subscriber
//! only* and its dropped counter is bumped. The orchestration task therefore
//! cannot be stalled by a slow or absent front end, at the price that two
//! subscribers may observe different subsets of the stream under load.
//!
//! ```text
//! Engine / EventUi
//!     | publish (try_send, never blocks)
//! [EventBus]
//!     |            |             |
//!     v            v             v
//! [queue 100]  [queue 100]   [queue N]
//! console UI   audit log     web UI
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::models::{LogLevel, StageInfo, StageResult};
use crate::ui::rendezvous::PromptRequest;

/// Default per-subscriber queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Lifecycle events published during a run. Transient, never persisted.
#[derive(Debug, Clone)]
pub enum Event {
    StageStarted { stage: StageInfo },
    StageCompleted { stage: StageInfo, result: StageResult },
    Progress { percent: u8, message: String },
    Log { level: LogLevel, message: String },
    Prompt(PromptRequest),
}

impl Event {
    /// Short tag for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StageStarted { .. } => "stage_started",
            Event::StageCompleted { .. } => "stage_completed",
            Event::Progress { .. } => "progress",
            Event::Log { .. } => "log",
            Event::Prompt(_) => "prompt",
        }
    }
}

struct SubscriberSlot {
    id: u64,
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

struct BusInner {
    subscribers: Vec<SubscriberSlot>,
    next_id: u64,
    closed: bool,
}

/// Publish/subscribe fan-out. Share it behind an `Arc`.
pub struct EventBus {
    capacity: usize,
    inner: Mutex<BusInner>,
    dropped_total: AtomicU64,
}

/// Receiving end of one subscription.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Bus whose subscriptions each buffer at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        EventBus {
            capacity: capacity.max(1),
            inner: Mutex::new(BusInner {
                subscribers: Vec::new(),
                next_id: 0,
                closed: false,
            }),
            dropped_total: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate a new independent queue and return its receiving end.
    ///
    /// Subscribing after [`close`](Self::close) yields a subscription that is
    /// already at end-of-stream.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        if !inner.closed {
            inner.subscribers.push(SubscriberSlot {
                id,
                tx,
                dropped: Arc::clone(&dropped),
            });
        }

        Subscription { id, rx, dropped }
    }

    /// Fan `event` out to every live subscriber without blocking.
    pub fn publish(&self, event: Event) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }

        let kind = event.kind();
        inner.subscribers.retain(|slot| match slot.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                slot.dropped.fetch_add(1, Ordering::Relaxed);
                self.dropped_total.fetch_add(1, Ordering::Relaxed);
                log::debug!("[Bus] subscriber {} queue full, dropped {} event", slot.id, kind);
                true
            }
            // Receiver went away: prune the slot
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Release every subscriber queue. Receivers drain what is buffered, then
    /// see end-of-stream. Safe to call more than once.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Events dropped across all subscribers since the bus was created.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        // A panic while holding the lock cannot leave the slot list torn.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` once the bus is closed and the queue drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.rx.try_recv()
    }

    /// Everything currently buffered, without waiting.
    pub fn drain_ready(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Number of events dropped for this subscriber because its queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(n: u8) -> Event {
        Event::Progress {
            percent: n,
            message: format!("step {}", n),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish(progress(1));
        assert_eq!(bus.dropped_total(), 0);
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe();
        for n in 0..5 {
            bus.publish(progress(n));
        }
        assert_eq!(sub.dropped(), 3);
        assert_eq!(bus.dropped_total(), 3);
        assert_eq!(sub.drain_ready().len(), 2);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let _keep = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(sub);
        bus.publish(progress(1));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_streams_after_buffered_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(progress(7));
        bus.close();
        bus.close();

        assert!(matches!(sub.recv().await, Some(Event::Progress { percent: 7, .. })));
        assert!(sub.recv().await.is_none());

        let mut late = bus.subscribe();
        assert!(late.recv().await.is_none());
        bus.publish(progress(8));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
