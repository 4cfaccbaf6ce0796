use crate::subscription::book::OrderBookEvent;
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Venue documented orderbook checksums, verified after each applied delta.
pub mod checksum;

/// Maintains a collection of local [`OrderBook`]s from streamed [`OrderBookEvent`]s and
/// publishes snapshots to the orderbook registry.
pub mod manager;

/// Snapshot-first reconciliation state machine handling the delta-before-snapshot race.
pub mod sync;

/// Normalised Harbor [`OrderBook`] snapshot.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
pub struct OrderBook {
    sequence: u64,
    time_engine: Option<DateTime<Utc>>,
    bids: OrderBookSide<Bids>,
    asks: OrderBookSide<Asks>,
}

impl OrderBook {
    /// Construct a new sorted [`OrderBook`].
    ///
    /// Note that the passed bid and asks levels do not need to be pre-sorted.
    pub fn new<IterBids, IterAsks, L>(
        sequence: u64,
        time_engine: Option<DateTime<Utc>>,
        bids: IterBids,
        asks: IterAsks,
    ) -> Self
    where
        IterBids: IntoIterator<Item = L>,
        IterAsks: IntoIterator<Item = L>,
        L: Into<Level>,
    {
        Self {
            sequence,
            time_engine,
            bids: OrderBookSide::bids(bids),
            asks: OrderBookSide::asks(asks),
        }
    }

    /// Current `u64` sequence number associated with the [`OrderBook`].
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current engine time associated with the [`OrderBook`].
    pub fn time_engine(&self) -> Option<DateTime<Utc>> {
        self.time_engine
    }

    /// Generate a sorted [`OrderBook`] snapshot with a maximum depth.
    pub fn snapshot(&self, depth: usize) -> Self {
        Self {
            sequence: self.sequence,
            time_engine: self.time_engine,
            bids: OrderBookSide::bids(self.bids.levels.iter().take(depth).copied()),
            asks: OrderBookSide::asks(self.asks.levels.iter().take(depth).copied()),
        }
    }

    /// Update the local [`OrderBook`] from a new [`OrderBookEvent`].
    pub fn update(&mut self, event: &OrderBookEvent) {
        match event {
            OrderBookEvent::Snapshot(snapshot) => {
                *self = snapshot.clone();
            }
            OrderBookEvent::Update(update) => {
                self.sequence = update.sequence;
                self.time_engine = update.time_engine;
                self.bids.upsert(update.bids.levels());
                self.asks.upsert(update.asks.levels());
            }
        }
    }

    /// Return a reference to this [`OrderBook`]s bids.
    pub fn bids(&self) -> &OrderBookSide<Bids> {
        &self.bids
    }

    /// Return a reference to this [`OrderBook`]s asks.
    pub fn asks(&self) -> &OrderBookSide<Asks> {
        &self.asks
    }

    /// Best bid [`Level`], if any.
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.best()
    }

    /// Best ask [`Level`], if any.
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.best()
    }

    /// Verify the structural invariants of this [`OrderBook`]: bids strictly descending, asks
    /// strictly ascending, no zero-amount levels, and `best_bid < best_ask`.
    pub fn validate(&self) -> Result<(), BookIntegrityError> {
        let descending = self
            .bids
            .levels()
            .windows(2)
            .all(|pair| pair[0].price > pair[1].price);
        if !descending {
            return Err(BookIntegrityError::BidsNotSorted);
        }

        let ascending = self
            .asks
            .levels()
            .windows(2)
            .all(|pair| pair[0].price < pair[1].price);
        if !ascending {
            return Err(BookIntegrityError::AsksNotSorted);
        }

        let zero_amount = self
            .bids
            .levels()
            .iter()
            .chain(self.asks.levels())
            .any(|level| level.amount.is_zero());
        if zero_amount {
            return Err(BookIntegrityError::ZeroAmountLevel);
        }

        if let (Some(best_bid), Some(best_ask)) = (self.best_bid(), self.best_ask()) {
            if best_bid.price >= best_ask.price {
                return Err(BookIntegrityError::BidAskCrossed {
                    best_bid: best_bid.price,
                    best_ask: best_ask.price,
                });
            }
        }

        Ok(())
    }

    /// Calculate the mid-price by taking the average of the best bid and ask prices.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.bids.best(), self.asks.best()) {
            (Some(best_bid), Some(best_ask)) => Some(mid_price(best_bid.price, best_ask.price)),
            (Some(best_bid), None) => Some(best_bid.price),
            (None, Some(best_ask)) => Some(best_ask.price),
            (None, None) => None,
        }
    }

    /// Calculate the volume weighted mid-price (micro-price), weighing the best bid and ask
    /// prices with their associated amount.
    pub fn volume_weighed_mid_price(&self) -> Option<Decimal> {
        match (self.bids.best(), self.asks.best()) {
            (Some(best_bid), Some(best_ask)) => {
                Some(volume_weighted_mid_price(*best_bid, *best_ask))
            }
            (Some(best_bid), None) => Some(best_bid.price),
            (None, Some(best_ask)) => Some(best_ask.price),
            (None, None) => None,
        }
    }
}

/// Structural invariant violations detected by [`OrderBook::validate`].
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BookIntegrityError {
    #[error("bid levels are not strictly descending")]
    BidsNotSorted,

    #[error("ask levels are not strictly ascending")]
    AsksNotSorted,

    #[error("book contains a zero-amount level")]
    ZeroAmountLevel,

    #[error("best bid {best_bid} crosses best ask {best_ask}")]
    BidAskCrossed {
        best_bid: Decimal,
        best_ask: Decimal,
    },
}

/// Normalised Harbor [`Level`]s for one `Side` of the [`OrderBook`].
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct OrderBookSide<Side> {
    #[serde(skip_serializing)]
    pub side: Side,
    levels: Vec<Level>,
}

/// Unit type to tag an [`OrderBookSide`] as the bid Side (ie/ buyers) of an [`OrderBook`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Display)]
pub struct Bids;

/// Unit type to tag an [`OrderBookSide`] as the ask Side (ie/ sellers) of an [`OrderBook`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Display)]
pub struct Asks;

impl OrderBookSide<Bids> {
    /// Construct a new [`OrderBookSide<Bids>`] from the provided [`Level`]s.
    pub fn bids<Iter, L>(levels: Iter) -> Self
    where
        Iter: IntoIterator<Item = L>,
        L: Into<Level>,
    {
        let mut levels = levels.into_iter().map(L::into).collect::<Vec<_>>();
        levels.sort_unstable_by(|a, b| a.price.cmp(&b.price).reverse());

        Self { side: Bids, levels }
    }

    /// Upsert bid [`Level`]s into this [`OrderBookSide<Bids>`].
    pub fn upsert<L>(&mut self, levels: &[L])
    where
        L: Into<Level> + Copy,
    {
        levels.iter().for_each(|upsert| {
            let upsert: Level = (*upsert).into();
            self.upsert_single(upsert, |existing| {
                existing.price.cmp(&upsert.price).reverse()
            })
        })
    }
}

impl OrderBookSide<Asks> {
    /// Construct a new [`OrderBookSide<Asks>`] from the provided [`Level`]s.
    pub fn asks<Iter, L>(levels: Iter) -> Self
    where
        Iter: IntoIterator<Item = L>,
        L: Into<Level>,
    {
        let mut levels = levels.into_iter().map(L::into).collect::<Vec<_>>();
        levels.sort_unstable_by(|a, b| a.price.cmp(&b.price));

        Self { side: Asks, levels }
    }

    /// Upsert ask [`Level`]s into this [`OrderBookSide<Asks>`].
    pub fn upsert<L>(&mut self, levels: &[L])
    where
        L: Into<Level> + Copy,
    {
        levels.iter().for_each(|upsert| {
            let upsert = (*upsert).into();
            self.upsert_single(upsert, |existing| existing.price.cmp(&upsert.price))
        })
    }
}

impl<Side> OrderBookSide<Side>
where
    Side: std::fmt::Display + std::fmt::Debug,
{
    /// Get best [`Level`] on the [`OrderBookSide`].
    pub fn best(&self) -> Option<&Level> {
        self.levels.first()
    }

    /// Return a reference to the [`OrderBookSide`] levels.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Upsert a single [`Level`] into this [`OrderBookSide`].
    ///
    /// ### Upsert Scenarios
    /// #### 1 Level Already Exists
    /// 1a) New value is 0, remove the level
    /// 1b) New value is > 0, replace the level
    ///
    /// #### 2 Level Does Not Exist
    /// 2a) New value is 0, log debug and continue
    /// 2b) New value is > 0, insert new level
    pub fn upsert_single<FnOrd>(&mut self, new_level: Level, fn_ord: FnOrd)
    where
        FnOrd: Fn(&Level) -> Ordering,
    {
        match (self.levels.binary_search_by(fn_ord), new_level.amount) {
            (Ok(index), new_amount) => {
                if new_amount.is_zero() {
                    // Scenario 1a: Level exists & new value is 0 => remove level
                    let _removed = self.levels.remove(index);
                } else {
                    // Scenario 1b: Level exists & new value is > 0 => replace level
                    self.levels[index].amount = new_amount;
                }
            }
            (Err(index), new_amount) => {
                if new_amount.is_zero() {
                    // Scenario 2a: Level does not exist & new value is 0 => log & continue
                    debug!(
                        ?new_level,
                        side = %self.side,
                        "received upsert Level with zero amount (to remove) that was not found"
                    );
                } else {
                    // Scenario 2b: Level does not exist & new value > 0 => insert new level
                    self.levels.insert(index, new_level);
                }
            }
        }
    }
}

impl Default for OrderBookSide<Bids> {
    fn default() -> Self {
        Self {
            side: Bids,
            levels: vec![],
        }
    }
}

impl Default for OrderBookSide<Asks> {
    fn default() -> Self {
        Self {
            side: Asks,
            levels: vec![],
        }
    }
}

/// Normalised Harbor OrderBook [`Level`].
#[derive(Debug, Copy, Clone, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize)]
pub struct Level {
    pub price: Decimal,
    pub amount: Decimal,
}

impl<T> From<(T, T)> for Level
where
    T: Into<Decimal>,
{
    fn from((price, amount): (T, T)) -> Self {
        Self::new(price, amount)
    }
}

impl Eq for Level {}

impl Level {
    pub fn new<T>(price: T, amount: T) -> Self
    where
        T: Into<Decimal>,
    {
        Self {
            price: price.into(),
            amount: amount.into(),
        }
    }
}

/// Calculate the mid-price by taking the average of the best bid and ask prices.
pub fn mid_price(best_bid_price: Decimal, best_ask_price: Decimal) -> Decimal {
    (best_bid_price + best_ask_price) / Decimal::TWO
}

/// Calculate the volume weighted mid-price (micro-price), weighing the best bid and ask prices
/// with their associated amount.
pub fn volume_weighted_mid_price(best_bid: Level, best_ask: Level) -> Decimal {
    ((best_bid.price * best_ask.amount) + (best_ask.price * best_bid.amount))
        / (best_bid.amount + best_ask.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_update_is_idempotent_for_same_sequence() {
        let mut book = OrderBook::new(
            100,
            None,
            vec![Level::new(dec!(100), dec!(1))],
            vec![Level::new(dec!(110), dec!(1))],
        );

        let update = OrderBookEvent::Update(OrderBook::new(
            101,
            None,
            vec![Level::new(dec!(99), dec!(2))],
            vec![],
        ));

        book.update(&update);
        let after_first = book.clone();
        book.update(&update);
        assert_eq!(book, after_first);
    }

    #[test]
    fn test_validate_invariants() {
        struct TestCase {
            book: OrderBook,
            expected: Result<(), BookIntegrityError>,
        }

        let tests = vec![
            TestCase {
                // TC0: well-formed book
                book: OrderBook::new(
                    1,
                    None,
                    vec![Level::new(dec!(100), dec!(1)), Level::new(dec!(99), dec!(1))],
                    vec![Level::new(dec!(101), dec!(1)), Level::new(dec!(102), dec!(1))],
                ),
                expected: Ok(()),
            },
            TestCase {
                // TC1: crossed book
                book: OrderBook::new(
                    1,
                    None,
                    vec![Level::new(dec!(102), dec!(1))],
                    vec![Level::new(dec!(101), dec!(1))],
                ),
                expected: Err(BookIntegrityError::BidAskCrossed {
                    best_bid: dec!(102),
                    best_ask: dec!(101),
                }),
            },
            TestCase {
                // TC2: empty book is trivially valid
                book: OrderBook::default(),
                expected: Ok(()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.book.validate(), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_upsert_zero_amount_deletes_level() {
        let mut side = OrderBookSide::bids(vec![
            Level::new(dec!(80), dec!(1)),
            Level::new(dec!(90), dec!(1)),
            Level::new(dec!(100), dec!(1)),
        ]);

        side.upsert(&[Level::new(dec!(100), dec!(0))]);
        assert_eq!(
            side.levels(),
            &[Level::new(dec!(90), dec!(1)), Level::new(dec!(80), dec!(1))]
        );
    }

    #[test]
    fn test_mid_price() {
        let book = OrderBook::new(
            0,
            None,
            vec![Level::new(dec!(100.0), dec!(100.0)), Level::new(dec!(50.0), dec!(100.0))],
            vec![Level::new(dec!(200.0), dec!(100.0)), Level::new(dec!(300.0), dec!(100.0))],
        );
        assert_eq!(book.mid_price(), Some(dec!(150.0)));
    }

    #[test]
    fn test_volume_weighted_mid_price() {
        let book = OrderBook::new(
            0,
            None,
            vec![Level::new(dec!(100.0), dec!(3000.0))],
            vec![Level::new(dec!(200.0), dec!(1000.0))],
        );
        assert_eq!(book.volume_weighed_mid_price(), Some(dec!(175.0)));
    }
}
