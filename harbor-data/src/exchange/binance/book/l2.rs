use super::BinanceLevel;
use crate::{
    books::OrderBook,
    event::MarketEvent,
    exchange::{binance::channel::BinanceChannel, subscription::ExchangeSub},
    subscription::book::OrderBookEvent,
};
use crate::Identifier;
use chrono::Utc;
use harbor_instrument::exchange::VenueId;
use harbor_integration::subscription::SubscriptionId;
use serde::{Deserialize, Serialize};

/// [`Binance`](crate::exchange::binance::Binance) HTTP OrderBook L2 snapshot.
///
/// Carries the `lastUpdateId` the streamed deltas are reconciled against.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#order-book>
/// ```json
/// {
///     "lastUpdateId": 1027024,
///     "bids": [["4.00000000", "431.00000000"]],
///     "asks": [["4.00000200", "12.00000000"]]
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceOrderBookL2Snapshot {
    #[serde(alias = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<BinanceLevel>,
    pub asks: Vec<BinanceLevel>,
}

impl From<BinanceOrderBookL2Snapshot> for OrderBook {
    fn from(snapshot: BinanceOrderBookL2Snapshot) -> Self {
        OrderBook::new(
            snapshot.last_update_id,
            None,
            snapshot.bids,
            snapshot.asks,
        )
    }
}

impl<InstrumentKey> From<(VenueId, InstrumentKey, BinanceOrderBookL2Snapshot)>
    for MarketEvent<InstrumentKey, OrderBookEvent>
{
    fn from(
        (exchange, instrument, snapshot): (VenueId, InstrumentKey, BinanceOrderBookL2Snapshot),
    ) -> Self {
        Self {
            time_exchange: Utc::now(),
            time_received: Utc::now(),
            exchange,
            instrument,
            kind: OrderBookEvent::Snapshot(OrderBook::from(snapshot)),
        }
    }
}

/// [`Binance`](crate::exchange::binance::Binance) OrderBook Level2 deltas WebSocket message.
///
/// ### Raw Payload Examples
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#diff-depth-stream>
/// ```json
/// {
///     "e":"depthUpdate",
///     "E":1671656397761,
///     "s":"ETHUSDT",
///     "U":22611425143,
///     "u":22611425151,
///     "b":[["1209.67000000","85.48210000"]],
///     "a":[]
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct BinanceOrderBookL2Update {
    #[serde(alias = "s", deserialize_with = "de_ob_l2_subscription_id")]
    pub subscription_id: SubscriptionId,
    #[serde(
        alias = "E",
        deserialize_with = "harbor_integration::de::de_u64_epoch_ms_as_datetime_utc"
    )]
    pub time_exchange: chrono::DateTime<Utc>,
    #[serde(alias = "U")]
    pub first_update_id: u64,
    #[serde(alias = "u")]
    pub last_update_id: u64,
    #[serde(alias = "b")]
    pub bids: Vec<BinanceLevel>,
    #[serde(alias = "a")]
    pub asks: Vec<BinanceLevel>,
}

impl Identifier<Option<SubscriptionId>> for BinanceOrderBookL2Update {
    fn id(&self) -> Option<SubscriptionId> {
        Some(self.subscription_id.clone())
    }
}

impl crate::books::sync::SequencedUpdate for BinanceOrderBookL2Update {
    fn first_update_id(&self) -> u64 {
        self.first_update_id
    }

    fn last_update_id(&self) -> u64 {
        self.last_update_id
    }
}

impl<InstrumentKey> From<(VenueId, InstrumentKey, BinanceOrderBookL2Update)>
    for crate::event::MarketIter<InstrumentKey, OrderBookEvent>
{
    fn from(
        (exchange, instrument, update): (VenueId, InstrumentKey, BinanceOrderBookL2Update),
    ) -> Self {
        Self(vec![Ok(MarketEvent {
            time_exchange: update.time_exchange,
            time_received: Utc::now(),
            exchange,
            instrument,
            kind: OrderBookEvent::Update(OrderBook::new(
                update.last_update_id,
                None,
                update.bids,
                update.asks,
            )),
        })])
    }
}

/// Deserialize a [`BinanceOrderBookL2Update`] "s" (eg/ "BTCUSDT") as the associated
/// [`SubscriptionId`] (eg/ "@depth@100ms|BTCUSDT").
pub fn de_ob_l2_subscription_id<'de, D>(deserializer: D) -> Result<SubscriptionId, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    <&str as Deserialize>::deserialize(deserializer)
        .map(|market| ExchangeSub::from((BinanceChannel::ORDER_BOOK_L2, market)).id())
}
