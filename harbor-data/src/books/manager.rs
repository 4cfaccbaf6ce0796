use crate::{
    books::{OrderBook, checksum::ChecksumMethod},
    error::DataError,
    event::MarketEvent,
    registry::OrderBookRegistry,
    streams::reconnect,
    subscription::book::OrderBookEvent,
};
use fnv::FnvHashMap;
use futures::Stream;
use futures_util::StreamExt;
use harbor_instrument::{MarketKey, exchange::VenueId};
use parking_lot::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handle to one shared-state local [`OrderBook`].
///
/// Readers obtain cheap snapshots through the lock; the `stale` flag marks the window between
/// divergence detection and the next consistent snapshot, during which reads return the last
/// known good book.
#[derive(Debug, Clone, Default)]
pub struct BookHandle {
    pub book: Arc<RwLock<OrderBook>>,
    stale: Arc<AtomicBool>,
}

impl BookHandle {
    /// Determine if this book is currently resynchronising.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::Relaxed);
    }
}

/// Request to unsubscribe and resubscribe one market's orderbook channel with a fresh snapshot.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResyncRequest {
    pub key: MarketKey,
}

/// Maintains a set of local L2 [`OrderBook`]s by applying streamed [`OrderBookEvent`]s,
/// verifying venue checksums, and publishing consistent snapshots to the
/// [`OrderBookRegistry`].
///
/// Divergence (checksum mismatch) marks only the offending market stale and issues a
/// [`ResyncRequest`] for that market; every other book continues uninterrupted.
#[derive(Debug)]
pub struct OrderBookSynchronizer {
    books: FnvHashMap<MarketKey, BookHandle>,
    checksums: FnvHashMap<MarketKey, ChecksumMethod>,
    registry: Arc<OrderBookRegistry>,
    resync_tx: mpsc::UnboundedSender<ResyncRequest>,
}

impl OrderBookSynchronizer {
    /// Construct a new [`OrderBookSynchronizer`] for the provided markets, returning the
    /// receiver of [`ResyncRequest`]s the subscription layer actions.
    pub fn new<KeyIter>(
        keys: KeyIter,
        registry: Arc<OrderBookRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<ResyncRequest>)
    where
        KeyIter: IntoIterator<Item = (MarketKey, Option<ChecksumMethod>)>,
    {
        let (resync_tx, resync_rx) = mpsc::unbounded_channel();
        let mut books = FnvHashMap::default();
        let mut checksums = FnvHashMap::default();
        for (key, method) in keys {
            books.insert(key.clone(), BookHandle::default());
            if let Some(method) = method {
                checksums.insert(key, method);
            }
        }

        (
            Self {
                books,
                checksums,
                registry,
                resync_tx,
            },
            resync_rx,
        )
    }

    /// Find the [`BookHandle`] of a configured market.
    pub fn book(&self, key: &MarketKey) -> Option<&BookHandle> {
        self.books.get(key)
    }

    /// Apply one streamed [`OrderBookEvent`] to its local book.
    ///
    /// Snapshots replace the book and clear staleness (implicit resync anchor for venues that
    /// publish wire snapshots). Deltas are applied on top, then verified against the venue
    /// checksum when one was sent. A mismatch marks the book stale, requests an
    /// unsubscribe+resubscribe for this market only, and surfaces
    /// [`DataError::ChecksumMismatch`].
    pub fn apply(
        &mut self,
        key: &MarketKey,
        event: OrderBookEvent,
        wire_checksum: Option<u32>,
    ) -> Result<(), DataError> {
        let Some(handle) = self.books.get(key) else {
            warn!(%key, "consumed OrderBookEvent for non-configured market");
            return Ok(());
        };

        let snapshot = {
            let mut book = handle.book.write();
            let is_wire_snapshot = matches!(event, OrderBookEvent::Snapshot(_));
            book.update(&event);

            if let (Some(expected), Some(method)) = (wire_checksum, self.checksums.get(key)) {
                let computed = method.compute(&book);
                if computed != expected {
                    handle.set_stale(true);
                    let _send = self.resync_tx.send(ResyncRequest { key: key.clone() });
                    return Err(DataError::ChecksumMismatch { expected, computed });
                }
            }

            if is_wire_snapshot {
                handle.set_stale(false);
            }
            book.clone()
        };

        // Publish the consistent snapshot outside the book lock
        self.registry
            .process(key.clone(), snapshot, handle.is_stale())?;
        Ok(())
    }

    /// Invalidate every book of the provided venue, eg/ after its connection dropped. The
    /// subscription layer re-issues the full roster on reconnect, so no per-market
    /// [`ResyncRequest`]s are sent.
    pub fn invalidate_venue(&mut self, venue: VenueId) {
        for (key, handle) in &self.books {
            if key.venue == venue {
                handle.set_stale(true);
            }
        }
        debug!(%venue, "marked all venue books stale pending reconnect resync");
    }

    /// Drive this synchronizer from a reconnecting stream of [`OrderBookEvent`]s.
    pub async fn run<St>(mut self, mut stream: St)
    where
        St: Stream<
                Item = reconnect::Event<
                    VenueId,
                    Result<MarketEvent<MarketKey, OrderBookEvent>, DataError>,
                >,
            > + Unpin,
    {
        while let Some(stream_event) = stream.next().await {
            match stream_event {
                reconnect::Event::Reconnecting(venue) => {
                    warn!(%venue, "orderbook input stream disconnected");
                    self.invalidate_venue(venue);
                }
                reconnect::Event::Item(Ok(event)) => {
                    let key = event.instrument.clone();
                    if let Err(error) = self.apply(&key, event.kind, None) {
                        warn!(%key, %error, "failed to apply OrderBookEvent");
                    }
                }
                reconnect::Event::Item(Err(error)) => {
                    warn!(%error, "orderbook stream yielded error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::Level;
    use harbor_instrument::{asset::AssetClass, pair::Pair};
    use rust_decimal_macros::dec;

    fn key(base: &str) -> MarketKey {
        MarketKey::new(VenueId::Okx, AssetClass::Spot, Pair::new(base, "usdt"))
    }

    fn snapshot(sequence: u64) -> OrderBookEvent {
        OrderBookEvent::Snapshot(OrderBook::new(
            sequence,
            None,
            vec![Level::new(dec!(100), dec!(1))],
            vec![Level::new(dec!(101), dec!(1))],
        ))
    }

    #[test]
    fn test_checksum_mismatch_resyncs_only_offending_market() {
        let registry = Arc::new(OrderBookRegistry::new());
        let (mut synchronizer, mut resync_rx) = OrderBookSynchronizer::new(
            [
                (key("btc"), Some(ChecksumMethod::Okx)),
                (key("eth"), Some(ChecksumMethod::Okx)),
            ],
            Arc::clone(&registry),
        );

        synchronizer.apply(&key("btc"), snapshot(1), None).unwrap();
        synchronizer.apply(&key("eth"), snapshot(1), None).unwrap();

        // Inject a delta whose wire checksum cannot match the local book
        let bad_delta = OrderBookEvent::Update(OrderBook::new(
            2,
            None,
            vec![Level::new(dec!(99), dec!(5))],
            vec![],
        ));
        let result = synchronizer.apply(&key("btc"), bad_delta, Some(1));
        assert!(matches!(result, Err(DataError::ChecksumMismatch { .. })));

        // Only the offending market goes stale and requests resubscription
        assert!(synchronizer.book(&key("btc")).unwrap().is_stale());
        assert!(!synchronizer.book(&key("eth")).unwrap().is_stale());
        assert_eq!(
            resync_rx.try_recv().unwrap(),
            ResyncRequest { key: key("btc") }
        );
        assert!(resync_rx.try_recv().is_err());
    }

    #[test]
    fn test_wire_snapshot_clears_staleness() {
        let registry = Arc::new(OrderBookRegistry::new());
        let (mut synchronizer, _resync_rx) =
            OrderBookSynchronizer::new([(key("btc"), None)], Arc::clone(&registry));

        synchronizer.invalidate_venue(VenueId::Okx);
        assert!(synchronizer.book(&key("btc")).unwrap().is_stale());

        synchronizer.apply(&key("btc"), snapshot(5), None).unwrap();
        assert!(!synchronizer.book(&key("btc")).unwrap().is_stale());
    }

    #[test]
    fn test_matching_checksum_publishes() {
        let registry = Arc::new(OrderBookRegistry::new());
        let (mut synchronizer, _resync_rx) = OrderBookSynchronizer::new(
            [(key("btc"), Some(ChecksumMethod::Okx))],
            Arc::clone(&registry),
        );

        // Compute the checksum the venue would send for the post-update book
        let mut expected_book = OrderBook::default();
        expected_book.update(&snapshot(1));
        let wire = ChecksumMethod::Okx.compute(&expected_book);

        synchronizer
            .apply(&key("btc"), snapshot(1), Some(wire))
            .unwrap();
        assert!(registry.get(&key("btc")).is_ok());
    }
}
