//! Non-blocking snapshot publisher with per-subscriber buffers
//!
//! Each subscriber owns a bounded queue. Publishing pushes the snapshot
//! into every queue and never waits: on overflow the oldest snapshot is
//! dropped and counted. Snapshots equal to the last published state for
//! the instrument are suppressed, so subscribers only see changes.
//!
//! Publishing to an unsubscribed id is a no-op.

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};
use types::ids::InstrumentId;

use crate::top_of_book::TopOfBook;

/// Handle identifying one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Publisher tuning
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Maximum buffered snapshots per subscriber
    pub buffer_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 256,
        }
    }
}

struct SubscriberQueue {
    buffer: VecDeque<TopOfBook>,
    capacity: usize,
    dropped: u64,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    fn push(&mut self, snapshot: TopOfBook) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            self.dropped += 1;
        }
        self.buffer.push_back(snapshot);
    }
}

struct PublisherInner {
    subscribers: BTreeMap<SubscriptionId, SubscriberQueue>,
    /// Last published snapshot per instrument, for change suppression
    last: BTreeMap<InstrumentId, TopOfBook>,
    next_id: u64,
}

/// Fan-out point for top-of-book snapshots
pub struct TopOfBookPublisher {
    inner: Mutex<PublisherInner>,
    config: PublisherConfig,
}

impl TopOfBookPublisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            inner: Mutex::new(PublisherInner {
                subscribers: BTreeMap::new(),
                last: BTreeMap::new(),
                next_id: 0,
            }),
            config,
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner
            .subscribers
            .insert(id, SubscriberQueue::new(self.config.buffer_capacity));
        debug!(subscriber = id.0, "top-of-book subscriber registered");
        id
    }

    /// Remove a subscriber; its undrained snapshots are discarded
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().subscribers.remove(&id);
        debug!(subscriber = id.0, "top-of-book subscriber removed");
    }

    /// Publish a snapshot to all subscribers
    ///
    /// Returns `true` if the snapshot differed from the last published
    /// state for its instrument (and was therefore delivered).
    pub fn publish(&self, snapshot: TopOfBook) -> bool {
        let mut inner = self.inner.lock();

        if inner.last.get(&snapshot.instrument) == Some(&snapshot) {
            return false;
        }
        inner
            .last
            .insert(snapshot.instrument.clone(), snapshot.clone());

        let mut overflowed = 0usize;
        for queue in inner.subscribers.values_mut() {
            let before = queue.dropped;
            queue.push(snapshot.clone());
            if queue.dropped > before {
                overflowed += 1;
            }
        }
        if overflowed > 0 {
            warn!(
                instrument = %snapshot.instrument,
                subscribers = overflowed,
                "top-of-book buffers overflowed; oldest snapshots dropped"
            );
        }
        true
    }

    /// Take all buffered snapshots for a subscriber, in publication order
    pub fn drain(&self, id: SubscriptionId) -> Vec<TopOfBook> {
        match self.inner.lock().subscribers.get_mut(&id) {
            Some(queue) => queue.buffer.drain(..).collect(),
            None => Vec::new(),
        }
    }

    /// Snapshots dropped for a subscriber due to overflow
    pub fn dropped(&self, id: SubscriptionId) -> u64 {
        self.inner
            .lock()
            .subscribers
            .get(&id)
            .map(|q| q.dropped)
            .unwrap_or(0)
    }

    /// Last published snapshot for an instrument, if any
    pub fn last_published(&self, instrument: &InstrumentId) -> Option<TopOfBook> {
        self.inner.lock().last.get(instrument).cloned()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for TopOfBookPublisher {
    fn default() -> Self {
        Self::new(PublisherConfig::default())
    }
}
