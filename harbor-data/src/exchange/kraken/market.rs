use super::Kraken;
use crate::{Identifier, instrument::MarketInstrument, subscription::Subscription};
use serde::{Deserialize, Serialize};

/// Type that defines how to translate a Harbor [`Subscription`] into a [`Kraken`]
/// market that can be subscribed to.
///
/// eg/ "BTC/USD"
///
/// See docs: <https://docs.kraken.com/api/docs/websocket-v2/book>
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct KrakenMarket(pub String);

impl<Kind> Identifier<KrakenMarket> for Subscription<Kraken, MarketInstrument, Kind> {
    fn id(&self) -> KrakenMarket {
        KrakenMarket(
            format!(
                "{}/{}",
                self.instrument.key.pair.base, self.instrument.key.pair.quote
            )
            .to_uppercase(),
        )
    }
}

impl AsRef<str> for KrakenMarket {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
