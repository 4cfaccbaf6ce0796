use super::Okx;
use crate::{Identifier, instrument::MarketInstrument, subscription::Subscription};
use harbor_instrument::asset::AssetClass;
use serde::{Deserialize, Serialize};

/// Type that defines how to translate a Harbor [`Subscription`] into an [`Okx`]
/// market that can be subscribed to.
///
/// eg/ "BTC-USDT" (spot), "BTC-USDT-SWAP" (perpetual swap)
///
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-public-channel>
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub struct OkxMarket(pub String);

impl<Kind> Identifier<OkxMarket> for Subscription<Okx, MarketInstrument, Kind> {
    fn id(&self) -> OkxMarket {
        let pair = &self.instrument.key.pair;
        let market = match self.instrument.key.asset {
            AssetClass::PerpetualSwap => {
                format!("{}-{}-SWAP", pair.base, pair.quote).to_uppercase()
            }
            _ => format!("{}-{}", pair.base, pair.quote).to_uppercase(),
        };
        OkxMarket(market)
    }
}

impl AsRef<str> for OkxMarket {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
