use super::Binance;
use crate::{
    exchange::{ExchangeServer, StreamSelector},
    instrument::InstrumentData,
    subscription::book::OrderBooksL2,
};
use harbor_instrument::exchange::VenueId;

/// [`BinanceSpot`] OrderBooksL2 snapshot fetcher and snapshot-first reconciling transformer.
pub mod l2;

/// [`BinanceSpot`] WebSocket server base url.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#websocket-market-streams>
pub const WEBSOCKET_BASE_URL_BINANCE_SPOT: &str = "wss://stream.binance.com:9443/ws";

/// [`Binance`] spot venue.
pub type BinanceSpot = Binance<BinanceServerSpot>;

/// [`Binance`] spot [`ExchangeServer`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct BinanceServerSpot;

impl ExchangeServer for BinanceServerSpot {
    const ID: VenueId = VenueId::BinanceSpot;

    fn websocket_url() -> &'static str {
        WEBSOCKET_BASE_URL_BINANCE_SPOT
    }
}

impl<Instrument> StreamSelector<Instrument, OrderBooksL2> for BinanceSpot
where
    Instrument: InstrumentData,
{
    type SnapFetcher = l2::BinanceSpotOrderBooksL2SnapshotFetcher;
    type Stream =
        super::BinanceWsStream<l2::BinanceSpotOrderBooksL2Transformer<Instrument::Key>>;
}
