//! Fan-out of crawl events to external subscribers.
//!
//! Each subscriber owns a bounded queue; `emit` copies the event to every
//! queue with `try_send` and drops it for any subscriber whose queue is
//! full. A slow consumer loses events, it never slows the crawler. Closing
//! the broadcaster closes every subscriber queue; later subscriptions see an
//! immediately-closed stream.
//!
//! The broadcaster is cheap to clone; all clones share one subscriber set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::mpsc;

use super::emitter::EventEmitter;
use super::types::CrawlEvent;
use crate::utils::constants::SUBSCRIBER_QUEUE_CAPACITY;

/// Delivery metrics, using lock-free atomic counters.
#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    events_published: AtomicU64,
    events_dropped: AtomicU64,
    peak_subscribers: AtomicUsize,
}

impl BroadcastMetrics {
    #[must_use]
    pub fn snapshot(&self) -> BroadcastMetricsSnapshot {
        BroadcastMetricsSnapshot {
            events_published: self.events_published.load(Ordering::SeqCst),
            events_dropped: self.events_dropped.load(Ordering::SeqCst),
            peak_subscribers: self.peak_subscribers.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BroadcastMetricsSnapshot {
    pub events_published: u64,
    /// Events lost to full subscriber queues, summed across subscribers.
    pub events_dropped: u64,
    pub peak_subscribers: usize,
}

struct Registry {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<CrawlEvent>>,
}

struct Shared {
    registry: RwLock<Registry>,
    metrics: BroadcastMetrics,
    closed: AtomicBool,
    queue_capacity: usize,
}

impl Shared {
    fn lock_registry(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Event fan-out with per-subscriber bounded buffers.
#[derive(Clone)]
pub struct EventBroadcaster {
    shared: Arc<Shared>,
}

impl EventBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// A broadcaster whose subscribers each buffer up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: RwLock::new(Registry {
                    next_id: 0,
                    senders: HashMap::new(),
                }),
                metrics: BroadcastMetrics::default(),
                closed: AtomicBool::new(false),
                queue_capacity: capacity.max(1),
            }),
        }
    }

    /// Attach a new subscriber.
    ///
    /// After `close()` this still returns a subscription, but its stream is
    /// already closed: the first `recv` yields `None`.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::channel(self.shared.queue_capacity);

        if self.shared.closed.load(Ordering::SeqCst) {
            drop(tx);
            return EventSubscription {
                id: u64::MAX,
                receiver: rx,
                shared: Weak::new(),
            };
        }

        let id = {
            let mut registry = self.shared.lock_registry();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.senders.insert(id, tx);
            let count = registry.senders.len();
            self.shared
                .metrics
                .peak_subscribers
                .fetch_max(count, Ordering::SeqCst);
            id
        };

        EventSubscription {
            id,
            receiver: rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Attach a subscriber that only sees events passing `filter`.
    #[must_use]
    pub fn subscribe_filtered<F>(&self, filter: F) -> super::streaming::FilteredSubscription<F>
    where
        F: Fn(&CrawlEvent) -> bool + Send + 'static,
    {
        super::streaming::FilteredSubscription::new(self.subscribe(), filter)
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.shared.read_registry().senders.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn metrics(&self) -> &BroadcastMetrics {
        &self.shared.metrics
    }

    /// Close every subscriber queue. Idempotent; later `emit` calls are
    /// silent no-ops.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.lock_registry().senders.clear();
        log::debug!("event broadcaster closed");
    }

    fn broadcast(&self, event: CrawlEvent) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }

        let mut dead: Vec<u64> = Vec::new();
        {
            let registry = self.shared.read_registry();
            for (id, sender) in &registry.senders {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.shared.metrics.events_dropped.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }
        self.shared.metrics.events_published.fetch_add(1, Ordering::SeqCst);

        if !dead.is_empty() {
            let mut registry = self.shared.lock_registry();
            for id in dead {
                registry.senders.remove(&id);
            }
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for EventBroadcaster {
    fn emit(&self, event: CrawlEvent) {
        self.broadcast(event);
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("client_count", &self.client_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// One subscriber's end of the event stream.
///
/// Dropping the subscription detaches it from the broadcaster.
pub struct EventSubscription {
    id: u64,
    receiver: mpsc::Receiver<CrawlEvent>,
    shared: Weak<Shared>,
}

impl EventSubscription {
    /// Receive the next event; `None` once the broadcaster has closed and
    /// the buffered events are drained.
    pub async fn recv(&mut self) -> Option<CrawlEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for polling front ends.
    pub fn try_recv(&mut self) -> Result<CrawlEvent, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock_registry().senders.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription").field("id", &self.id).finish()
    }
}
