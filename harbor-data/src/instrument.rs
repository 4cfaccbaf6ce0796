use harbor_instrument::{MarketKey, asset::AssetClass, pair::Pair};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Instrument describing data carried by a [`Subscription`](crate::subscription::Subscription).
pub trait InstrumentData
where
    Self: Clone + Debug + Send + Sync,
{
    type Key: Clone + Debug + PartialEq + Send + Sync;

    /// The key market data for this instrument is keyed by downstream.
    fn key(&self) -> &Self::Key;

    /// The currency pair of this instrument.
    fn pair(&self) -> &Pair;

    /// The contract family of this instrument.
    fn asset(&self) -> AssetClass;
}

/// Standard instrument: the market pair and asset class, keyed by the full [`MarketKey`].
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct MarketInstrument {
    #[serde(flatten)]
    pub key: MarketKey,
}

impl MarketInstrument {
    pub fn new(key: MarketKey) -> Self {
        Self { key }
    }
}

impl From<MarketKey> for MarketInstrument {
    fn from(key: MarketKey) -> Self {
        Self::new(key)
    }
}

impl InstrumentData for MarketInstrument {
    type Key = MarketKey;

    fn key(&self) -> &Self::Key {
        &self.key
    }

    fn pair(&self) -> &Pair {
        &self.key.pair
    }

    fn asset(&self) -> AssetClass {
        self.key.asset
    }
}
