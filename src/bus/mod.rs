// src/bus/mod.rs

//! In-process publish/subscribe router for execution events.
//!
//! Topics are [`EventType`] labels. Each subscription is a delivery channel;
//! one channel may be registered under many topics (the task subscriber
//! fans in eleven task-lifecycle topics through a single receiver).
//!
//! Delivery channels are unbounded, so `publish` never waits on a slow or
//! stalled consumer and events reach each subscriber in publish order.
//!
//! All clones of a delivery channel share one sending slot. `close` empties
//! the slot of every distinct channel exactly once, so receivers drain what
//! is buffered and then observe `None` even while a caller still holds a
//! channel handle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::types::{EventType, ExecutionEvent};

/// Receiving half handed to a subscriber loop.
pub type EventReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a delivery channel, used to deduplicate on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

type SenderSlot = Arc<Mutex<Option<mpsc::UnboundedSender<ExecutionEvent>>>>;

/// Sending half of a delivery channel, tagged with its identity.
///
/// Clones share the sender; once the bus closes the channel no clone can
/// send on it again.
#[derive(Debug, Clone)]
pub struct DeliveryChannel {
    id: ChannelId,
    tx: SenderSlot,
}

impl DeliveryChannel {
    /// Create a new delivery channel and its receiver.
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
        (
            Self {
                id,
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// False if the channel is closed or its receiver was dropped.
    fn send(&self, event: ExecutionEvent) -> bool {
        let slot = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Drop the shared sender. Returns false if it was already gone.
    fn close(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

#[derive(Debug, Default)]
struct BusState {
    topics: HashMap<EventType, Vec<DeliveryChannel>>,
    closed: bool,
}

/// Topic-keyed event router shared by the poller and the subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    state: RwLock<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `channel` for every future publication under `topic`.
    pub fn subscribe(&self, topic: EventType, channel: &DeliveryChannel) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            debug!(%topic, "subscribe after close ignored");
            return;
        }
        debug!(%topic, channel = channel.id.0, "subscribing channel");
        state.topics.entry(topic).or_default().push(channel.clone());
    }

    /// Create one channel, register it under every topic in `topics` and
    /// return its receiver. The bus keeps the only sending handles, so the
    /// receiver ends exactly when the bus closes.
    pub fn subscribe_all<'a, I>(&self, topics: I) -> EventReceiver
    where
        I: IntoIterator<Item = &'a EventType>,
    {
        let (channel, rx) = DeliveryChannel::new();
        for topic in topics {
            self.subscribe(topic.clone(), &channel);
        }
        rx
    }

    /// Deliver `event` to every subscriber of `topic`.
    ///
    /// The subscriber list is snapshotted under the read lock; sends happen
    /// after the lock is released. Returns the number of channels the event
    /// was handed to.
    pub fn publish(&self, topic: &EventType, event: &ExecutionEvent) -> usize {
        let targets: Vec<DeliveryChannel> = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            match state.topics.get(topic) {
                Some(channels) => channels.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for channel in targets {
            if channel.send(event.clone()) {
                delivered += 1;
            } else {
                trace!(%topic, channel = channel.id.0, "channel closed or receiver dropped");
            }
        }
        delivered
    }

    /// Close every distinct channel ever registered, exactly once.
    ///
    /// Returns the number of distinct channels closed; calling it again
    /// closes nothing.
    pub fn close(&self) -> usize {
        let topics = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.closed = true;
            std::mem::take(&mut state.topics)
        };

        let mut seen: HashSet<ChannelId> = HashSet::new();
        let mut closed = 0;
        for channel in topics.into_values().flatten() {
            if seen.insert(channel.id) && channel.close() {
                closed += 1;
            }
        }

        debug!(channels = closed, "event bus closed");
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).closed
    }

    /// Number of channels registered under `topic`.
    pub fn subscriber_count(&self, topic: &EventType) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }
}
