use super::SubscriptionKind;
use crate::books::OrderBook;
use serde::{Deserialize, Serialize};

/// Harbor [`Subscription`](super::Subscription) [`SubscriptionKind`] that yields L2
/// [`OrderBookEvent`] market events.
///
/// Level 2 refers to an [`OrderBook`] with orders at each price level aggregated.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
pub struct OrderBooksL2;

impl SubscriptionKind for OrderBooksL2 {
    type Event = OrderBookEvent;

    fn as_str(&self) -> &'static str {
        "order_books_l2"
    }
}

impl std::fmt::Display for OrderBooksL2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalised Harbor [`OrderBookEvent`] - either a full snapshot that replaces the local book,
/// or a delta applied on top of it.
///
/// Venues that publish periodic full snapshots on the wire ("partial" books) emit
/// [`OrderBookEvent::Snapshot`], which the synchronizer treats as an implicit resync anchor.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub enum OrderBookEvent {
    Snapshot(OrderBook),
    Update(OrderBook),
}

impl OrderBookEvent {
    /// The sequence number carried by the wrapped book.
    pub fn sequence(&self) -> u64 {
        match self {
            OrderBookEvent::Snapshot(book) | OrderBookEvent::Update(book) => book.sequence(),
        }
    }
}
