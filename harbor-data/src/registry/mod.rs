use crate::{books::OrderBook, subscription::ticker::Ticker};
use fnv::FnvHashMap;
use harbor_instrument::{MarketKey, asset::AssetClass, exchange::VenueId};
use harbor_integration::channel::{BoundedTxDropOnFull, mpsc_bounded_drop_on_full};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Default per-subscriber buffer capacity for registry fan-out.
const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// All errors generated by the process-wide market data registries.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Error)]
pub enum RegistryError {
    #[error("market key carries an empty pair")]
    EmptyKey,

    #[error("ticker bid is greater than ask")]
    BidGreaterThanAsk,

    #[error("ticker bid equals ask outside margin funding")]
    BidEqualsAsk,

    #[error("ticker not found for: {0}")]
    TickerNotFound(String),

    #[error("orderbook not found for: {0}")]
    BookNotFound(String),

    #[error("orderbook integrity violation: {0}")]
    BookIntegrity(String),
}

/// Process-wide [`Ticker`] store keyed by [`MarketKey`] with publish/subscribe fan-out.
///
/// Constructed once at startup and shared by `Arc`. Publishing never blocks: slow subscribers
/// have updates dropped against a counter instead.
#[derive(Debug, Default)]
pub struct TickerRegistry {
    tickers: RwLock<FnvHashMap<MarketKey, Ticker>>,
    key_subscribers: Mutex<FnvHashMap<MarketKey, Vec<BoundedTxDropOnFull<(MarketKey, Ticker)>>>>,
    venue_subscribers: Mutex<FnvHashMap<VenueId, Vec<BoundedTxDropOnFull<(MarketKey, Ticker)>>>>,
    stale_drops: AtomicU64,
}

impl TickerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and upsert a [`Ticker`], publishing to key and venue subscribers.
    ///
    /// Rejects `bid > ask` always, and `bid == ask` unless the market is margin-funding.
    /// Updates older than the stored `last_updated` are dropped against a counter, never
    /// published out of order.
    pub fn process(&self, key: MarketKey, ticker: Ticker) -> Result<(), RegistryError> {
        if key.pair.is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if !ticker.bid.is_zero() && !ticker.ask.is_zero() {
            if ticker.bid > ticker.ask {
                return Err(RegistryError::BidGreaterThanAsk);
            }
            if ticker.bid == ticker.ask && key.asset != AssetClass::MarginFunding {
                return Err(RegistryError::BidEqualsAsk);
            }
        }

        {
            let mut tickers = self.tickers.write();
            if let Some(stored) = tickers.get(&key) {
                if stored.last_updated > ticker.last_updated {
                    self.stale_drops.fetch_add(1, Ordering::Relaxed);
                    debug!(%key, "dropped ticker update older than stored ticker");
                    return Ok(());
                }
            }
            tickers.insert(key.clone(), ticker);
        }

        self.publish(key, ticker);
        Ok(())
    }

    fn publish(&self, key: MarketKey, ticker: Ticker) {
        {
            let mut subscribers = self.key_subscribers.lock();
            if let Some(list) = subscribers.get_mut(&key) {
                list.retain(|tx| tx.try_send((key.clone(), ticker)));
            }
        }
        {
            let mut subscribers = self.venue_subscribers.lock();
            if let Some(list) = subscribers.get_mut(&key.venue) {
                list.retain(|tx| tx.try_send((key.clone(), ticker)));
            }
        }
    }

    /// The stored [`Ticker`] for the provided [`MarketKey`].
    pub fn get(&self, key: &MarketKey) -> Result<Ticker, RegistryError> {
        self.tickers
            .read()
            .get(key)
            .copied()
            .ok_or_else(|| RegistryError::TickerNotFound(key.to_string()))
    }

    /// Subscribe to ticker updates of one market.
    pub fn subscribe(&self, key: MarketKey) -> mpsc::Receiver<(MarketKey, Ticker)> {
        let (tx, rx) = mpsc_bounded_drop_on_full(DEFAULT_SUBSCRIBER_BUFFER);
        self.key_subscribers.lock().entry(key).or_default().push(tx);
        rx
    }

    /// Subscribe to every ticker update of one venue.
    pub fn subscribe_venue(&self, venue: VenueId) -> mpsc::Receiver<(MarketKey, Ticker)> {
        let (tx, rx) = mpsc_bounded_drop_on_full(DEFAULT_SUBSCRIBER_BUFFER);
        self.venue_subscribers
            .lock()
            .entry(venue)
            .or_default()
            .push(tx);
        rx
    }

    /// Number of ticker updates dropped for arriving older than the stored ticker.
    pub fn stale_drops(&self) -> u64 {
        self.stale_drops.load(Ordering::Relaxed)
    }
}

/// Published view of one market's local orderbook.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub book: Arc<OrderBook>,
    /// Set while the market resynchronises; the wrapped book is the last consistent state.
    pub stale: bool,
}

/// Process-wide [`OrderBook`] store keyed by [`MarketKey`].
///
/// Writers construct and swap immutable `Arc` snapshots; readers clone the `Arc` without
/// contending on level data.
#[derive(Debug, Default)]
pub struct OrderBookRegistry {
    books: RwLock<FnvHashMap<MarketKey, BookSnapshot>>,
    subscribers: Mutex<FnvHashMap<MarketKey, Vec<BoundedTxDropOnFull<(MarketKey, BookSnapshot)>>>>,
}

impl OrderBookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish a new [`OrderBook`] snapshot for the provided [`MarketKey`].
    ///
    /// Structural invariants (sorted sides, no zero-amount levels, uncrossed top of book) are
    /// enforced for every non-stale snapshot.
    pub fn process(
        &self,
        key: MarketKey,
        book: OrderBook,
        stale: bool,
    ) -> Result<(), RegistryError> {
        if key.pair.is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if !stale {
            book.validate()
                .map_err(|error| RegistryError::BookIntegrity(error.to_string()))?;
        }

        let snapshot = BookSnapshot {
            book: Arc::new(book),
            stale,
        };
        self.books.write().insert(key.clone(), snapshot.clone());

        let mut subscribers = self.subscribers.lock();
        if let Some(list) = subscribers.get_mut(&key) {
            list.retain(|tx| tx.try_send((key.clone(), snapshot.clone())));
        }
        Ok(())
    }

    /// The latest published [`BookSnapshot`] for the provided [`MarketKey`].
    pub fn get(&self, key: &MarketKey) -> Result<BookSnapshot, RegistryError> {
        self.books
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::BookNotFound(key.to_string()))
    }

    /// Subscribe to orderbook snapshots of one market.
    pub fn subscribe(&self, key: MarketKey) -> mpsc::Receiver<(MarketKey, BookSnapshot)> {
        let (tx, rx) = mpsc_bounded_drop_on_full(DEFAULT_SUBSCRIBER_BUFFER);
        self.subscribers.lock().entry(key).or_default().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::Level;
    use chrono::Utc;
    use harbor_instrument::pair::Pair;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn key(asset: AssetClass) -> MarketKey {
        MarketKey::new(VenueId::Kraken, asset, Pair::new("btc", "usd"))
    }

    fn ticker(bid: Decimal, ask: Decimal) -> Ticker {
        Ticker {
            bid,
            ask,
            bid_size: dec!(1),
            ask_size: dec!(1),
            last_updated: Utc::now(),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_ticker_bid_ask_invariants() {
        struct TestCase {
            asset: AssetClass,
            bid: Decimal,
            ask: Decimal,
            expected: Result<(), RegistryError>,
        }

        let tests = vec![
            TestCase {
                // TC0: margin book with bid == ask is rejected
                asset: AssetClass::Margin,
                bid: dec!(1337),
                ask: dec!(1337),
                expected: Err(RegistryError::BidEqualsAsk),
            },
            TestCase {
                // TC1: bid > ask is always rejected
                asset: AssetClass::Margin,
                bid: dec!(1338),
                ask: dec!(1336),
                expected: Err(RegistryError::BidGreaterThanAsk),
            },
            TestCase {
                // TC2: margin funding books may cross at equality
                asset: AssetClass::MarginFunding,
                bid: dec!(1337),
                ask: dec!(1337),
                expected: Ok(()),
            },
            TestCase {
                // TC3: margin funding still rejects bid > ask
                asset: AssetClass::MarginFunding,
                bid: dec!(1338),
                ask: dec!(1336),
                expected: Err(RegistryError::BidGreaterThanAsk),
            },
            TestCase {
                // TC4: regular spot ticker accepted
                asset: AssetClass::Spot,
                bid: dec!(1336),
                ask: dec!(1337),
                expected: Ok(()),
            },
        ];

        let registry = TickerRegistry::new();
        for (index, test) in tests.into_iter().enumerate() {
            let actual = registry.process(key(test.asset), ticker(test.bid, test.ask));
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_get_missing_ticker() {
        let registry = TickerRegistry::new();
        assert!(matches!(
            registry.get(&key(AssetClass::Spot)),
            Err(RegistryError::TickerNotFound(_))
        ));
    }

    #[test]
    fn test_older_ticker_updates_are_dropped() {
        let registry = TickerRegistry::new();
        let newer = ticker(dec!(99), dec!(100));
        registry.process(key(AssetClass::Spot), newer).unwrap();

        let older = Ticker {
            last_updated: newer.last_updated - chrono::TimeDelta::seconds(5),
            bid: dec!(1),
            ask: dec!(2),
            ..Default::default()
        };
        registry.process(key(AssetClass::Spot), older).unwrap();

        // Stored ticker still the newer one, drop counted
        assert_eq!(registry.get(&key(AssetClass::Spot)).unwrap().bid, dec!(99));
        assert_eq!(registry.stale_drops(), 1);
    }

    #[tokio::test]
    async fn test_ticker_publish_fan_out() {
        let registry = TickerRegistry::new();
        let mut key_rx = registry.subscribe(key(AssetClass::Spot));
        let mut venue_rx = registry.subscribe_venue(VenueId::Kraken);

        registry
            .process(key(AssetClass::Spot), ticker(dec!(99), dec!(100)))
            .unwrap();

        assert_eq!(key_rx.recv().await.unwrap().0, key(AssetClass::Spot));
        assert_eq!(venue_rx.recv().await.unwrap().0, key(AssetClass::Spot));
    }

    #[test]
    fn test_orderbook_registry_rejects_crossed_books() {
        let registry = OrderBookRegistry::new();
        let crossed = OrderBook::new(
            1,
            None,
            vec![Level::new(dec!(101), dec!(1))],
            vec![Level::new(dec!(100), dec!(1))],
        );

        assert!(matches!(
            registry.process(key(AssetClass::Spot), crossed.clone(), false),
            Err(RegistryError::BookIntegrity(_))
        ));

        // The same book is tolerated while flagged stale (documented resync window)
        registry
            .process(key(AssetClass::Spot), crossed, true)
            .unwrap();
        assert!(registry.get(&key(AssetClass::Spot)).unwrap().stale);
    }
}
