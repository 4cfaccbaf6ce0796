use super::Binance;
use crate::{Identifier, instrument::MarketInstrument, subscription::Subscription};
use serde::{Deserialize, Serialize};

/// Type that defines how to translate a Harbor [`Subscription`] into a [`Binance`]
/// market that can be subscribed to.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#websocket-market-streams>
/// See docs: <https://binance-docs.github.io/apidocs/futures/en/#websocket-market-streams>
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct BinanceMarket(pub String);

impl<Server, Kind> Identifier<BinanceMarket>
    for Subscription<Binance<Server>, MarketInstrument, Kind>
{
    fn id(&self) -> BinanceMarket {
        // Notes:
        // - Must be lowercase when subscribing (transformed to lowercase by Binance fn requests).
        // - Must be uppercase since Binance sends messages with uppercase MARKET (eg/ BTCUSDT).
        BinanceMarket(format!("{}{}", self.instrument.key.pair.base, self.instrument.key.pair.quote).to_uppercase())
    }
}

impl AsRef<str> for BinanceMarket {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
