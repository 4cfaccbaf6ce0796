use crate::event::Event;
use std::{cmp::Ordering, collections::BinaryHeap};

/// Deterministic discrete-event priority queue.
///
/// Events pop in `(timestamp, venue, asset, pair, kind priority)` order with a stable FIFO
/// tie-break, so two runs over identical inputs drain in identical order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an [`Event`] into the queue.
    pub fn push(&mut self, event: Event) {
        self.sequence += 1;
        self.heap.push(QueuedEvent {
            event,
            sequence: self.sequence,
        });
    }

    /// Pop the next [`Event`] in deterministic order.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|queued| queued.event)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[derive(Debug)]
struct QueuedEvent {
    event: Event,
    sequence: u64,
}

impl QueuedEvent {
    fn ordering_key(&self) -> (i64, &harbor_instrument::MarketKey, u8, u64) {
        let meta = self.event.meta();
        (
            meta.time.timestamp_micros(),
            &meta.key,
            self.event.kind_priority(),
            self.sequence,
        )
    }
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.ordering_key() == other.ordering_key()
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse for min-first draining
        self.ordering_key().cmp(&other.ordering_key()).reverse()
    }
}
