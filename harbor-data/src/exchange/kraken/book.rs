use super::channel::KrakenChannel;
use crate::{
    Identifier,
    books::{Level, OrderBook, checksum::ChecksumMethod},
    error::DataError,
    event::{MarketEvent, MarketIter},
    exchange::{Connector, kraken::Kraken, subscription::ExchangeSub},
    subscription::{
        Map,
        book::{OrderBookEvent, OrderBooksL2},
    },
    transformer::ExchangeTransformer,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harbor_integration::{
    Transformer, protocol::websocket::WsMessage, subscription::SubscriptionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// [`Kraken`] checksummed L2 book message, carrying either a wire snapshot or a delta for one
/// market.
///
/// ### Raw Payload Examples
/// See docs: <https://docs.kraken.com/api/docs/websocket-v2/book>
/// ```json
/// {
///     "channel": "book",
///     "type": "update",
///     "data": [
///         {
///             "symbol": "BTC/USD",
///             "bids": [{"price": 30300.1, "qty": 0.5}],
///             "asks": [],
///             "checksum": 3310070434,
///             "timestamp": "2023-10-06T17:35:55.440295Z"
///         }
///     ]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct KrakenBookMessage {
    #[serde(rename = "channel")]
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: KrakenBookMessageKind,
    pub data: Vec<KrakenBookData>,
}

/// Whether a [`KrakenBookMessage`] replaces the local book or applies on top of it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KrakenBookMessageKind {
    Snapshot,
    Update,
}

/// Book payload for one market.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct KrakenBookData {
    pub symbol: String,
    pub bids: Vec<KrakenBookLevel>,
    pub asks: Vec<KrakenBookLevel>,
    pub checksum: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// [`Kraken`] book level.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct KrakenBookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

impl From<KrakenBookLevel> for Level {
    fn from(level: KrakenBookLevel) -> Self {
        Self {
            price: level.price,
            amount: level.qty,
        }
    }
}

impl Identifier<Option<SubscriptionId>> for KrakenBookMessage {
    fn id(&self) -> Option<SubscriptionId> {
        if self.channel != KrakenChannel::ORDER_BOOK_L2.0 {
            return None;
        }
        self.data
            .first()
            .map(|data| ExchangeSub::from((KrakenChannel::ORDER_BOOK_L2, data.symbol.as_str())).id())
    }
}

/// State for one market's checksummed [`Kraken`] book.
#[derive(Debug)]
struct KrakenBookMeta<InstrumentKey> {
    key: InstrumentKey,
    book: OrderBook,
    sequence: u64,
}

/// [`Kraken`] stateful OrderBooksL2 [`ExchangeTransformer`].
///
/// Wire snapshots replace the local book; deltas apply on top. After every message the local
/// book's CRC32 is verified against the wire checksum - a mismatch surfaces
/// [`DataError::ChecksumMismatch`], a terminal error that forces resubscription with a fresh
/// snapshot.
#[derive(Debug)]
pub struct KrakenBookTransformer<InstrumentKey> {
    books: Map<KrakenBookMeta<InstrumentKey>>,
}

#[async_trait]
impl<InstrumentKey> ExchangeTransformer<Kraken, InstrumentKey, OrderBooksL2>
    for KrakenBookTransformer<InstrumentKey>
where
    InstrumentKey: Clone + PartialEq + Send + Sync,
{
    async fn init(
        instrument_map: Map<InstrumentKey>,
        _: &[MarketEvent<InstrumentKey, OrderBookEvent>],
        _: UnboundedSender<WsMessage>,
    ) -> Result<Self, DataError> {
        // Kraken publishes wire snapshots on subscribe, so no REST snapshots are required
        let books = instrument_map
            .0
            .into_iter()
            .map(|(sub_id, key)| {
                (
                    sub_id,
                    KrakenBookMeta {
                        key,
                        book: OrderBook::default(),
                        sequence: 0,
                    },
                )
            })
            .collect();

        Ok(Self { books })
    }
}

impl<InstrumentKey> Transformer for KrakenBookTransformer<InstrumentKey>
where
    InstrumentKey: Clone,
{
    type Error = DataError;
    type Input = KrakenBookMessage;
    type Output = MarketEvent<InstrumentKey, OrderBookEvent>;
    type OutputIter = Vec<Result<Self::Output, Self::Error>>;

    fn transform(&mut self, input: Self::Input) -> Self::OutputIter {
        let subscription_id = match input.id() {
            Some(subscription_id) => subscription_id,
            None => return vec![],
        };

        let meta = match self.books.find_mut(&subscription_id) {
            Ok(meta) => meta,
            Err(unidentifiable) => return vec![Err(DataError::from(unidentifiable))],
        };

        let mut outputs = Vec::with_capacity(input.data.len());
        for data in input.data {
            meta.sequence += 1;

            let event = match input.kind {
                KrakenBookMessageKind::Snapshot => {
                    // Wire snapshot: implicit resync anchor replacing the local book
                    meta.book = OrderBook::new(
                        meta.sequence,
                        data.timestamp,
                        data.bids.clone(),
                        data.asks.clone(),
                    );
                    OrderBookEvent::Snapshot(meta.book.clone())
                }
                KrakenBookMessageKind::Update => {
                    let delta = OrderBook::new(
                        meta.sequence,
                        data.timestamp,
                        data.bids.clone(),
                        data.asks.clone(),
                    );
                    let event = OrderBookEvent::Update(delta);
                    meta.book.update(&event);
                    event
                }
            };

            // Verify the local book against the wire checksum after every applied message
            let computed = ChecksumMethod::Kraken.compute(&meta.book);
            if computed != data.checksum {
                outputs.push(Err(DataError::ChecksumMismatch {
                    expected: data.checksum,
                    computed,
                }));
                continue;
            }

            outputs.push(
                MarketIter::<InstrumentKey, OrderBookEvent>::from((
                    Kraken::ID,
                    meta.key.clone(),
                    (data.timestamp, event),
                ))
                .0
                .remove(0),
            );
        }
        outputs
    }
}

impl<InstrumentKey> From<(harbor_instrument::exchange::VenueId, InstrumentKey, (Option<DateTime<Utc>>, OrderBookEvent))>
    for MarketIter<InstrumentKey, OrderBookEvent>
{
    fn from(
        (exchange, instrument, (time, event)): (
            harbor_instrument::exchange::VenueId,
            InstrumentKey,
            (Option<DateTime<Utc>>, OrderBookEvent),
        ),
    ) -> Self {
        Self(vec![Ok(MarketEvent {
            time_exchange: time.unwrap_or_else(Utc::now),
            time_received: Utc::now(),
            exchange,
            instrument,
            kind: event,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn message(
        kind: KrakenBookMessageKind,
        bids: Vec<KrakenBookLevel>,
        asks: Vec<KrakenBookLevel>,
        checksum: u32,
    ) -> KrakenBookMessage {
        KrakenBookMessage {
            channel: "book".to_string(),
            kind,
            data: vec![KrakenBookData {
                symbol: "BTC/USD".to_string(),
                bids,
                asks,
                checksum,
                timestamp: None,
            }],
        }
    }

    fn transformer() -> KrakenBookTransformer<&'static str> {
        KrakenBookTransformer {
            books: Map::from_iter([(
                SubscriptionId::from("book|BTC/USD"),
                KrakenBookMeta {
                    key: "btc_usd",
                    book: OrderBook::default(),
                    sequence: 0,
                },
            )]),
        }
    }

    fn valid_checksum(
        bids: &[KrakenBookLevel],
        asks: &[KrakenBookLevel],
        sequence: u64,
    ) -> u32 {
        let book = OrderBook::new(
            sequence,
            None,
            bids.to_vec(),
            asks.to_vec(),
        );
        ChecksumMethod::Kraken.compute(&book)
    }

    #[test]
    fn test_snapshot_then_update_with_valid_checksums() {
        let mut transformer = transformer();

        let bids = vec![KrakenBookLevel {
            price: dec!(30300.1),
            qty: dec!(0.5),
        }];
        let asks = vec![KrakenBookLevel {
            price: dec!(30300.2),
            qty: dec!(1.0),
        }];

        let snapshot = message(
            KrakenBookMessageKind::Snapshot,
            bids.clone(),
            asks.clone(),
            valid_checksum(&bids, &asks, 1),
        );
        let outputs = transformer.transform(snapshot);
        assert_eq!(outputs.len(), 1);
        assert!(matches!(
            outputs[0].as_ref().unwrap().kind,
            OrderBookEvent::Snapshot(_)
        ));
    }

    #[test]
    fn test_checksum_mismatch_surfaces_terminal_error() {
        let mut transformer = transformer();

        let bids = vec![KrakenBookLevel {
            price: dec!(30300.1),
            qty: dec!(0.5),
        }];
        let snapshot = message(KrakenBookMessageKind::Snapshot, bids, vec![], 1337);

        let outputs = transformer.transform(snapshot);
        assert_eq!(outputs.len(), 1);
        let error = outputs[0].as_ref().unwrap_err();
        assert!(matches!(error, DataError::ChecksumMismatch { .. }));
        assert!(error.is_terminal());
    }

    #[test]
    fn test_de_kraken_book_message() {
        let input = r#"
        {
            "channel": "book",
            "type": "update",
            "data": [
                {
                    "symbol": "BTC/USD",
                    "bids": [{"price": 30300.1, "qty": 0.5}],
                    "asks": [],
                    "checksum": 3310070434,
                    "timestamp": "2023-10-06T17:35:55.440295Z"
                }
            ]
        }
        "#;

        let actual = serde_json::from_str::<KrakenBookMessage>(input).unwrap();
        assert_eq!(actual.kind, KrakenBookMessageKind::Update);
        assert_eq!(actual.data[0].checksum, 3310070434);
        assert_eq!(actual.id(), Some(SubscriptionId::from("book|BTC/USD")));
    }
}
