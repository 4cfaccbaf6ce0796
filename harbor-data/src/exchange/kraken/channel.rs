use super::Kraken;
use crate::{
    Identifier,
    subscription::{Subscription, book::OrderBooksL2, trade::PublicTrades},
};
use serde::Serialize;

/// Type that defines how to translate a Harbor [`Subscription`] into a [`Kraken`]
/// channel to be subscribed to.
///
/// See docs: <https://docs.kraken.com/api/docs/websocket-v2/trade>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct KrakenChannel(pub &'static str);

impl KrakenChannel {
    /// [`Kraken`] real-time trades channel name.
    ///
    /// See docs: <https://docs.kraken.com/api/docs/websocket-v2/trade>
    pub const TRADES: Self = Self("trade");

    /// [`Kraken`] checksummed L2 book channel name.
    ///
    /// See docs: <https://docs.kraken.com/api/docs/websocket-v2/book>
    pub const ORDER_BOOK_L2: Self = Self("book");
}

impl<Instrument> Identifier<KrakenChannel> for Subscription<Kraken, Instrument, PublicTrades> {
    fn id(&self) -> KrakenChannel {
        KrakenChannel::TRADES
    }
}

impl<Instrument> Identifier<KrakenChannel> for Subscription<Kraken, Instrument, OrderBooksL2> {
    fn id(&self) -> KrakenChannel {
        KrakenChannel::ORDER_BOOK_L2
    }
}

impl AsRef<str> for KrakenChannel {
    fn as_ref(&self) -> &str {
        self.0
    }
}
