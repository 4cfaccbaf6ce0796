use crate::{
    Identifier, SnapshotFetcher,
    books::sync::{SequenceAction, SyncState},
    error::DataError,
    event::{MarketEvent, MarketIter},
    exchange::{
        Connector,
        binance::{
            book::l2::{BinanceOrderBookL2Snapshot, BinanceOrderBookL2Update},
            market::BinanceMarket,
            spot::BinanceSpot,
        },
    },
    instrument::InstrumentData,
    subscription::{
        Map, Subscription,
        book::{OrderBookEvent, OrderBooksL2},
    },
    transformer::ExchangeTransformer,
};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use harbor_instrument::exchange::VenueId;
use harbor_integration::{
    Transformer, error::SocketError, protocol::websocket::WsMessage,
    subscription::SubscriptionId,
};
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;

/// [`BinanceSpot`] HTTP OrderBook L2 snapshot url.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#order-book>
pub const HTTP_BOOK_L2_SNAPSHOT_URL_BINANCE_SPOT: &str = "https://api.binance.com/api/v3/depth";

#[derive(Debug)]
pub struct BinanceSpotOrderBooksL2SnapshotFetcher;

impl SnapshotFetcher<BinanceSpot, OrderBooksL2> for BinanceSpotOrderBooksL2SnapshotFetcher {
    fn fetch_snapshots<Instrument>(
        subscriptions: &[Subscription<BinanceSpot, Instrument, OrderBooksL2>],
    ) -> impl Future<Output = Result<Vec<MarketEvent<Instrument::Key, OrderBookEvent>>, SocketError>>
    + Send
    where
        Instrument: InstrumentData,
        Subscription<BinanceSpot, Instrument, OrderBooksL2>: Identifier<BinanceMarket>,
    {
        let l2_snapshot_futures = subscriptions.iter().map(|subscription| {
            // Construct initial OrderBook snapshot GET url
            let market = subscription.id();
            let snapshot_url = format!(
                "{}?symbol={}&limit=100",
                HTTP_BOOK_L2_SNAPSHOT_URL_BINANCE_SPOT, market.0,
            );

            async move {
                // Fetch initial OrderBook snapshot via HTTP
                let snapshot = reqwest::get(snapshot_url)
                    .await
                    .map_err(SocketError::Http)?
                    .json::<BinanceOrderBookL2Snapshot>()
                    .await
                    .map_err(SocketError::Http)?;

                Ok(MarketEvent::from((
                    VenueId::BinanceSpot,
                    subscription.instrument.key().clone(),
                    snapshot,
                )))
            }
        });

        try_join_all(l2_snapshot_futures)
    }
}

/// State for one instrument's L2 book stream: the instrument key, the snapshot-first
/// [`SyncState`] reconciling REST snapshot and streamed deltas, and the snapshot sequence
/// awaiting reconciliation.
#[derive(Debug)]
struct BinanceSpotBookMeta<InstrumentKey> {
    key: InstrumentKey,
    state: SyncState<BinanceOrderBookL2Update>,
    /// `lastUpdateId` of the fetched REST snapshot, consumed when the first streamed delta
    /// arrives and the buffered backlog is reconciled on top of it.
    snapshot_sequence: Option<u64>,
}

/// [`BinanceSpot`] stateful OrderBooksL2 [`ExchangeTransformer`].
///
/// BinanceSpot: How To Manage A Local OrderBook Correctly
///
/// 1. Open a stream to wss://stream.binance.com:9443/ws/BTCUSDT@depth.
/// 2. Buffer the events you receive from the stream.
/// 3. Get a depth snapshot from <https://api.binance.com/api/v3/depth?symbol=BNBBTC&limit=1000>.
/// 4. Drop any event where u is <= lastUpdateId in the snapshot.
/// 5. The first processed event should have U <= lastUpdateId+1 AND u >= lastUpdateId+1.
/// 6. While listening to the stream, each new event's U should be equal to the
///    previous event's u+1, otherwise initialize the process from step 3.
/// 7. The data in each event is the absolute quantity for a price level.
/// 8. If the quantity is 0, remove the price level.
///
/// Steps 2, 4 and 5 are the snapshot-first reconciliation of [`SyncState`]: deltas received
/// while the snapshot is outstanding are buffered, stale deltas dropped, and the overlap
/// verified before the backlog replays on top of the snapshot. A violated overlap or a later
/// sequence gap (step 6) surfaces a terminal error, forcing resubscription with a fresh
/// snapshot (step 3).
///
/// Notes:
///  - Receiving an event that removes a price level that is not in your local order book can
///    happen and is normal.
///  - Uppercase U => first_update_id
///  - Lowercase u => last_update_id
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#how-to-manage-a-local-order-book-correctly>
#[derive(Debug)]
pub struct BinanceSpotOrderBooksL2Transformer<InstrumentKey> {
    instrument_map: Map<BinanceSpotBookMeta<InstrumentKey>>,
}

#[async_trait]
impl<InstrumentKey> ExchangeTransformer<BinanceSpot, InstrumentKey, OrderBooksL2>
    for BinanceSpotOrderBooksL2Transformer<InstrumentKey>
where
    InstrumentKey: Clone + PartialEq + Send + Sync,
{
    async fn init(
        instrument_map: Map<InstrumentKey>,
        initial_snapshots: &[MarketEvent<InstrumentKey, OrderBookEvent>],
        _: UnboundedSender<WsMessage>,
    ) -> Result<Self, DataError> {
        let instrument_map = instrument_map
            .0
            .into_iter()
            .map(|(sub_id, instrument_key)| {
                let snapshot = initial_snapshots
                    .iter()
                    .find(|snapshot| snapshot.instrument == instrument_key)
                    .ok_or_else(|| DataError::InitialSnapshotMissing(sub_id.clone()))?;

                let OrderBookEvent::Snapshot(snapshot) = &snapshot.kind else {
                    return Err(DataError::InitialSnapshotInvalid(String::from(
                        "expected OrderBookEvent::Snapshot but found OrderBookEvent::Update",
                    )));
                };

                let book_meta = BinanceSpotBookMeta {
                    key: instrument_key,
                    state: SyncState::new(),
                    snapshot_sequence: Some(snapshot.sequence()),
                };

                Ok((sub_id, book_meta))
            })
            .collect::<Result<Map<_>, _>>()?;

        Ok(Self { instrument_map })
    }
}

impl<InstrumentKey> Transformer for BinanceSpotOrderBooksL2Transformer<InstrumentKey>
where
    InstrumentKey: Clone,
{
    type Error = DataError;
    type Input = BinanceOrderBookL2Update;
    type Output = MarketEvent<InstrumentKey, OrderBookEvent>;
    type OutputIter = Vec<Result<Self::Output, Self::Error>>;

    fn transform(&mut self, input: Self::Input) -> Self::OutputIter {
        // Determine if the message has an identifiable SubscriptionId
        let subscription_id = match input.id() {
            Some(subscription_id) => subscription_id,
            None => return vec![],
        };

        // Find the book state associated with the Input
        let meta = match self.instrument_map.find_mut(&subscription_id) {
            Ok(meta) => meta,
            Err(unidentifiable) => return vec![Err(DataError::from(unidentifiable))],
        };

        // Route the delta through the snapshot-first state machine
        let action = match meta.state.process(input) {
            Ok(action) => action,
            Err(error) => return vec![Err(error)],
        };

        match action {
            SequenceAction::Buffered => {
                // The REST snapshot is pending reconciliation: drop the buffered backlog that
                // predates it, verify the overlap, and replay the survivors in order
                let Some(snapshot_sequence) = meta.snapshot_sequence.take() else {
                    return vec![];
                };
                let replayed = match meta.state.apply_snapshot(snapshot_sequence) {
                    Ok(replayed) => replayed,
                    Err(error) => {
                        // Failed reconciliation keeps the anchor so the bounded retry budget
                        // governs further attempts before the stream is torn down
                        meta.snapshot_sequence = Some(snapshot_sequence);
                        return vec![Err(error)];
                    }
                };

                replayed
                    .into_iter()
                    .flat_map(|update| {
                        MarketIter::<InstrumentKey, OrderBookEvent>::from((
                            BinanceSpot::ID,
                            meta.key.clone(),
                            update,
                        ))
                        .0
                    })
                    .collect()
            }
            SequenceAction::Dropped => vec![],
            SequenceAction::Apply(update) => {
                MarketIter::<InstrumentKey, OrderBookEvent>::from((
                    BinanceSpot::ID,
                    meta.key.clone(),
                    update,
                ))
                .0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        books::{Level, OrderBook},
        exchange::binance::book::BinanceLevel,
    };
    use rust_decimal_macros::dec;

    fn update(
        first_update_id: u64,
        last_update_id: u64,
        bids: Vec<BinanceLevel>,
        asks: Vec<BinanceLevel>,
    ) -> BinanceOrderBookL2Update {
        BinanceOrderBookL2Update {
            subscription_id: SubscriptionId::from("@depth@100ms|BTCUSDT"),
            time_exchange: Default::default(),
            first_update_id,
            last_update_id,
            bids,
            asks,
        }
    }

    fn transformer(snapshot_sequence: u64) -> BinanceSpotOrderBooksL2Transformer<&'static str> {
        BinanceSpotOrderBooksL2Transformer {
            instrument_map: Map::from_iter([(
                SubscriptionId::from("@depth@100ms|BTCUSDT"),
                BinanceSpotBookMeta {
                    key: "btc_usdt",
                    state: SyncState::new(),
                    snapshot_sequence: Some(snapshot_sequence),
                },
            )]),
        }
    }

    #[test]
    fn test_snapshot_reconciliation_drops_stale_and_replays_straddling_delta() {
        // Local book seeded from the REST snapshot w/ lastUpdateId=161
        let mut book = OrderBook::new(
            161,
            None,
            vec![Level::new(dec!(6621.55), dec!(0.16356700))],
            vec![Level::new(dec!(6622.46), dec!(2.30000000))],
        );
        let mut transformer = transformer(161);

        // Delta with u=160 <= lastUpdateId=161: buffered, then dropped by reconciliation.
        // Nothing is emitted since no retained delta straddles the snapshot yet.
        let stale = update(
            157,
            160,
            vec![BinanceLevel {
                price: dec!(1),
                amount: dec!(1),
            }],
            vec![],
        );
        assert!(transformer.transform(stale).is_empty());

        // Delta straddling lastUpdateId+1: add bid 6621.45 and replace ask 6622.46 amount
        let valid = update(
            161,
            165,
            vec![BinanceLevel {
                price: dec!(6621.45),
                amount: dec!(0.3),
            }],
            vec![BinanceLevel {
                price: dec!(6622.46),
                amount: dec!(1.5),
            }],
        );
        let outputs = transformer.transform(valid);
        assert_eq!(outputs.len(), 1);

        let event = outputs.into_iter().next().unwrap().unwrap();
        book.update(&event.kind);

        assert_eq!(book.sequence(), 165);
        assert_eq!(
            book.bids().levels(),
            &[
                Level::new(dec!(6621.55), dec!(0.16356700)),
                Level::new(dec!(6621.45), dec!(0.3)),
            ]
        );
        assert_eq!(book.asks().levels(), &[Level::new(dec!(6622.46), dec!(1.5))]);
    }

    #[test]
    fn test_first_delta_reconciles_snapshot_then_stream_continues() {
        let mut transformer = transformer(161);

        // The first streamed delta is buffered, the snapshot reconciled on top of it, and the
        // straddling delta replayed
        let outputs = transformer.transform(update(161, 165, vec![], vec![]));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].as_ref().unwrap().kind.sequence(), 165);

        // Subsequent deltas chain through the synced state machine
        let outputs = transformer.transform(update(166, 170, vec![], vec![]));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].as_ref().unwrap().kind.sequence(), 170);
    }

    #[test]
    fn test_stale_snapshot_surfaces_terminal_error() {
        let mut transformer = transformer(161);

        // First retained delta starts after lastUpdateId+1: the snapshot is stale
        let outputs = transformer.transform(update(170, 175, vec![], vec![]));
        assert_eq!(outputs.len(), 1);
        let error = outputs[0].as_ref().unwrap_err();
        assert!(matches!(error, DataError::InvalidSequence { .. }));
        assert!(error.is_terminal());
    }

    #[test]
    fn test_post_sync_gap_surfaces_terminal_error() {
        let mut transformer = transformer(161);

        // Reconcile the snapshot with a straddling delta
        assert_eq!(transformer.transform(update(161, 165, vec![], vec![])).len(), 1);

        // Stale post-sync delta is dropped silently
        assert!(transformer.transform(update(150, 160, vec![], vec![])).is_empty());

        // A gapped delta surfaces the terminal error that forces resubscription
        let outputs = transformer.transform(update(180, 185, vec![], vec![]));
        let error = outputs[0].as_ref().unwrap_err();
        assert!(matches!(
            error,
            DataError::InvalidSequence {
                prev_last_update_id: 165,
                first_update_id: 180,
            }
        ));
        assert!(error.is_terminal());
    }
}
