use super::channel::OkxChannel;
use crate::{
    Identifier,
    books::{Level, OrderBook, checksum::ChecksumMethod},
    error::DataError,
    event::MarketEvent,
    exchange::{Connector, okx::Okx, subscription::ExchangeSub},
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

/// [`Okx`] checksummed L2 book message.
///
/// The first message after subscribing carries `action: "snapshot"` (a wire snapshot treated as
/// an implicit resync anchor); subsequent messages carry `action: "update"` deltas whose
/// `prevSeqId` must chain onto the stored `seqId`.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-public-channel-order-book-channel>
/// ```json
/// {
///     "arg": {"channel": "books", "instId": "BTC-USDT"},
///     "action": "update",
///     "data": [
///         {
///             "asks": [["8476.98", "415", "0", "13"]],
///             "bids": [["8476.97", "256", "0", "12"]],
///             "ts": "1597026383085",
///             "checksum": -855196043,
///             "prevSeqId": 123456,
///             "seqId": 123457
///         }
///     ]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OkxBookMessage {
    #[serde(deserialize_with = "de_okx_book_subscription_id", rename = "arg")]
    pub subscription_id: SubscriptionId,
    pub action: OkxBookAction,
    pub data: Vec<OkxBookData>,
}

/// Whether an [`OkxBookMessage`] replaces the local book or applies on top of it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OkxBookAction {
    Snapshot,
    Update,
}

/// Book payload for one market.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OkxBookData {
    pub bids: Vec<OkxBookLevel>,
    pub asks: Vec<OkxBookLevel>,
    #[serde(
        rename = "ts",
        deserialize_with = "harbor_integration::de::de_str_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
    pub checksum: i32,
    #[serde(rename = "prevSeqId", default)]
    pub prev_seq_id: i64,
    #[serde(rename = "seqId")]
    pub seq_id: i64,
}

/// [`Okx`] book level: `[price, amount, deprecated, order_count]`.
#[derive(Clone, Copy, PartialEq, Debug, Deserialize, Serialize)]
pub struct OkxBookLevel(
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
    #[serde(with = "rust_decimal::serde::str")] pub Decimal,
);

impl From<OkxBookLevel> for Level {
    fn from(level: OkxBookLevel) -> Self {
        Self {
            price: level.0,
            amount: level.1,
        }
    }
}

impl Identifier<Option<SubscriptionId>> for OkxBookMessage {
    fn id(&self) -> Option<SubscriptionId> {
        Some(self.subscription_id.clone())
    }
}

/// State for one market's checksummed [`Okx`] book.
#[derive(Debug)]
struct OkxBookMeta<InstrumentKey> {
    key: InstrumentKey,
    book: OrderBook,
    seq_id: i64,
}

/// [`Okx`] stateful OrderBooksL2 [`ExchangeTransformer`].
///
/// Wire snapshots reset the local book and `seqId` anchor. Updates must chain `prevSeqId` onto
/// the stored `seqId`; both a broken chain and a checksum mismatch surface terminal errors
/// forcing resubscription with a fresh snapshot.
#[derive(Debug)]
pub struct OkxBookTransformer<InstrumentKey> {
    books: Map<OkxBookMeta<InstrumentKey>>,
}

#[async_trait]
impl<InstrumentKey> ExchangeTransformer<Okx, InstrumentKey, OrderBooksL2>
    for OkxBookTransformer<InstrumentKey>
where
    InstrumentKey: Clone + PartialEq + Send + Sync,
{
    async fn init(
        instrument_map: Map<InstrumentKey>,
        _: &[MarketEvent<InstrumentKey, OrderBookEvent>],
        _: UnboundedSender<WsMessage>,
    ) -> Result<Self, DataError> {
        // Okx publishes a wire snapshot on subscribe, so no REST snapshots are required
        let books = instrument_map
            .0
            .into_iter()
            .map(|(sub_id, key)| {
                (
                    sub_id,
                    OkxBookMeta {
                        key,
                        book: OrderBook::default(),
                        seq_id: -1,
                    },
                )
            })
            .collect();

        Ok(Self { books })
    }
}

impl<InstrumentKey> Transformer for OkxBookTransformer<InstrumentKey>
where
    InstrumentKey: Clone,
{
    type Error = DataError;
    type Input = OkxBookMessage;
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
            let event = match input.action {
                OkxBookAction::Snapshot => {
                    // Implicit resync anchor: replace the book and reset the seqId chain
                    meta.book = OrderBook::new(
                        data.seq_id.max(0) as u64,
                        Some(data.time),
                        data.bids.clone(),
                        data.asks.clone(),
                    );
                    meta.seq_id = data.seq_id;
                    OrderBookEvent::Snapshot(meta.book.clone())
                }
                OkxBookAction::Update => {
                    // Updates must chain onto the stored seqId
                    if data.prev_seq_id != meta.seq_id {
                        outputs.push(Err(DataError::InvalidSequence {
                            prev_last_update_id: meta.seq_id.max(0) as u64,
                            first_update_id: data.prev_seq_id.max(0) as u64,
                        }));
                        continue;
                    }
                    meta.seq_id = data.seq_id;

                    let delta = OrderBook::new(
                        data.seq_id.max(0) as u64,
                        Some(data.time),
                        data.bids.clone(),
                        data.asks.clone(),
                    );
                    let event = OrderBookEvent::Update(delta);
                    meta.book.update(&event);
                    event
                }
            };

            // Verify the local book against the wire checksum after every applied message
            let computed = ChecksumMethod::Okx.compute(&meta.book);
            let expected = data.checksum as u32;
            if computed != expected {
                outputs.push(Err(DataError::ChecksumMismatch { expected, computed }));
                continue;
            }

            outputs.push(Ok(MarketEvent {
                time_exchange: data.time,
                time_received: Utc::now(),
                exchange: Okx::ID,
                instrument: meta.key.clone(),
                kind: event,
            }));
        }
        outputs
    }
}

/// Deserialize an [`OkxBookMessage`] "arg" as the associated [`SubscriptionId`]
/// (eg/ "books|BTC-USDT").
pub fn de_okx_book_subscription_id<'de, D>(deserializer: D) -> Result<SubscriptionId, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Arg {
        #[serde(rename = "instId")]
        inst_id: String,
    }

    Arg::deserialize(deserializer)
        .map(|arg| ExchangeSub::from((OkxChannel::ORDER_BOOK_L2, arg.inst_id)).id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, amount: Decimal) -> OkxBookLevel {
        OkxBookLevel(price, amount, dec!(0), dec!(1))
    }

    fn transformer() -> OkxBookTransformer<&'static str> {
        OkxBookTransformer {
            books: Map::from_iter([(
                SubscriptionId::from("books|BTC-USDT"),
                OkxBookMeta {
                    key: "btc_usdt",
                    book: OrderBook::default(),
                    seq_id: -1,
                },
            )]),
        }
    }

    fn message(
        action: OkxBookAction,
        bids: Vec<OkxBookLevel>,
        asks: Vec<OkxBookLevel>,
        checksum: i32,
        prev_seq_id: i64,
        seq_id: i64,
    ) -> OkxBookMessage {
        OkxBookMessage {
            subscription_id: SubscriptionId::from("books|BTC-USDT"),
            action,
            data: vec![OkxBookData {
                bids,
                asks,
                time: Default::default(),
                checksum,
                prev_seq_id,
                seq_id,
            }],
        }
    }

    fn checksum_for(bids: &[OkxBookLevel], asks: &[OkxBookLevel], seq: u64) -> i32 {
        let book = OrderBook::new(seq, None, bids.to_vec(), asks.to_vec());
        ChecksumMethod::Okx.compute(&book) as i32
    }

    #[test]
    fn test_snapshot_then_chained_update() {
        let mut transformer = transformer();

        let bids = vec![level(dec!(8476.97), dec!(256))];
        let asks = vec![level(dec!(8476.98), dec!(415))];
        let snapshot = message(
            OkxBookAction::Snapshot,
            bids.clone(),
            asks.clone(),
            checksum_for(&bids, &asks, 1),
            0,
            1,
        );
        assert!(transformer.transform(snapshot)[0].is_ok());

        // Chained update removing the ask level
        let mut expected = OrderBook::new(2, None, bids.clone(), asks.clone());
        expected.update(&OrderBookEvent::Update(OrderBook::new(
            2,
            None,
            vec![],
            vec![level(dec!(8476.98), dec!(0))],
        )));
        let update = message(
            OkxBookAction::Update,
            vec![],
            vec![level(dec!(8476.98), dec!(0))],
            ChecksumMethod::Okx.compute(&expected) as i32,
            1,
            2,
        );
        let outputs = transformer.transform(update);
        assert!(matches!(
            outputs[0].as_ref().unwrap().kind,
            OrderBookEvent::Update(_)
        ));
    }

    #[test]
    fn test_broken_seq_chain_surfaces_invalid_sequence() {
        let mut transformer = transformer();

        let bids = vec![level(dec!(8476.97), dec!(256))];
        let snapshot = message(
            OkxBookAction::Snapshot,
            bids.clone(),
            vec![],
            checksum_for(&bids, &[], 1),
            0,
            1,
        );
        assert!(transformer.transform(snapshot)[0].is_ok());

        // prevSeqId=5 does not chain onto stored seqId=1
        let update = message(OkxBookAction::Update, vec![], vec![], 0, 5, 6);
        let outputs = transformer.transform(update);
        assert!(matches!(
            outputs[0].as_ref().unwrap_err(),
            DataError::InvalidSequence { .. }
        ));
    }

    #[test]
    fn test_de_okx_book_message() {
        let input = r#"
        {
            "arg": {"channel": "books", "instId": "BTC-USDT"},
            "action": "update",
            "data": [
                {
                    "asks": [["8476.98", "415", "0", "13"]],
                    "bids": [["8476.97", "256", "0", "12"]],
                    "ts": "1597026383085",
                    "checksum": -855196043,
                    "prevSeqId": 123456,
                    "seqId": 123457
                }
            ]
        }
        "#;

        let actual = serde_json::from_str::<OkxBookMessage>(input).unwrap();
        assert_eq!(actual.subscription_id, SubscriptionId::from("books|BTC-USDT"));
        assert_eq!(actual.action, OkxBookAction::Update);
        assert_eq!(actual.data[0].checksum, -855196043);
        assert_eq!(actual.data[0].seq_id, 123457);
    }
}
