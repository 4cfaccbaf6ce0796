use crate::{
    error::DataError,
    subscription::{
        book::OrderBookEvent, candle::Candle, ticker::Ticker, trade::PublicTrade,
    },
};
use chrono::{DateTime, Utc};
use derive_more::From;
use harbor_instrument::{MarketKey, exchange::VenueId};
use serde::{Deserialize, Serialize};

/// Convenient new type containing a collection of [`MarketEvent<T>`](MarketEvent)s.
#[derive(Debug)]
pub struct MarketIter<InstrumentKey, T>(pub Vec<Result<MarketEvent<InstrumentKey, T>, DataError>>);

impl<InstrumentKey, T> FromIterator<Result<MarketEvent<InstrumentKey, T>, DataError>>
    for MarketIter<InstrumentKey, T>
{
    fn from_iter<Iter>(iter: Iter) -> Self
    where
        Iter: IntoIterator<Item = Result<MarketEvent<InstrumentKey, T>, DataError>>,
    {
        Self(iter.into_iter().collect())
    }
}

/// Normalised Harbor [`MarketEvent<T>`](Self) wrapping the `T` data variant in metadata.
///
/// Note: `T` can be an enum such as the [`DataKind`] if required.
///
/// ### Examples
/// - [`MarketEvent<PublicTrade>`](PublicTrade)
/// - [`MarketEvent<OrderBookEvent>`](OrderBookEvent)
/// - [`MarketEvent<DataKind>`](DataKind)
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct MarketEvent<InstrumentKey = MarketKey, T = DataKind> {
    pub time_exchange: DateTime<Utc>,
    pub time_received: DateTime<Utc>,
    pub exchange: VenueId,
    pub instrument: InstrumentKey,
    pub kind: T,
}

impl<InstrumentKey, T> MarketEvent<InstrumentKey, T> {
    pub fn map_kind<F, O>(self, op: F) -> MarketEvent<InstrumentKey, O>
    where
        F: FnOnce(T) -> O,
    {
        MarketEvent {
            time_exchange: self.time_exchange,
            time_received: self.time_received,
            exchange: self.exchange,
            instrument: self.instrument,
            kind: op(self.kind),
        }
    }
}

/// Available kinds of normalised Harbor [`MarketEvent<T>`](MarketEvent).
///
/// [`Self`] is purposefully not supported in any [`Subscription`](crate::subscription::Subscription)
/// directly - it is only used to make ergonomic streams containing many [`MarketEvent`] kinds.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, From)]
pub enum DataKind {
    Trade(PublicTrade),
    Ticker(Ticker),
    OrderBook(OrderBookEvent),
    Candle(Candle),
}

impl DataKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataKind::Trade(_) => "public_trade",
            DataKind::Ticker(_) => "ticker",
            DataKind::OrderBook(_) => "order_book",
            DataKind::Candle(_) => "candle",
        }
    }
}

impl<InstrumentKey> From<MarketEvent<InstrumentKey, PublicTrade>>
    for MarketEvent<InstrumentKey, DataKind>
{
    fn from(value: MarketEvent<InstrumentKey, PublicTrade>) -> Self {
        value.map_kind(PublicTrade::into)
    }
}

impl<InstrumentKey> From<MarketEvent<InstrumentKey, Ticker>>
    for MarketEvent<InstrumentKey, DataKind>
{
    fn from(value: MarketEvent<InstrumentKey, Ticker>) -> Self {
        value.map_kind(Ticker::into)
    }
}

impl<InstrumentKey> From<MarketEvent<InstrumentKey, OrderBookEvent>>
    for MarketEvent<InstrumentKey, DataKind>
{
    fn from(value: MarketEvent<InstrumentKey, OrderBookEvent>) -> Self {
        value.map_kind(OrderBookEvent::into)
    }
}

impl<InstrumentKey> From<MarketEvent<InstrumentKey, Candle>>
    for MarketEvent<InstrumentKey, DataKind>
{
    fn from(value: MarketEvent<InstrumentKey, Candle>) -> Self {
        value.map_kind(Candle::into)
    }
}
