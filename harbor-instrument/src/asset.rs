use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Contract family of a market.
///
/// Pair stores, registries and connectors are all partitioned by [`AssetClass`], since a venue
/// frequently lists the same [`Pair`](crate::pair::Pair) under several families with different
/// formats, limits and wire channels.
#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    Spot,
    Margin,
    MarginFunding,
    Index,
    Binary,
    PerpetualContract,
    PerpetualSwap,
    Futures,
    UpsideProfit,
    DownsideProfit,
    CoinMarginedFutures,
    UsdtMarginedFutures,
    UsdcMarginedFutures,
    Options,
    OptionCombo,
    FutureCombo,
    Spread,
    LinearContract,
}

impl AssetClass {
    /// Determine if this [`AssetClass`] belongs to the futures family of contracts.
    pub fn is_futures(&self) -> bool {
        matches!(
            self,
            AssetClass::PerpetualContract
                | AssetClass::PerpetualSwap
                | AssetClass::Futures
                | AssetClass::CoinMarginedFutures
                | AssetClass::UsdtMarginedFutures
                | AssetClass::UsdcMarginedFutures
                | AssetClass::LinearContract
        )
    }

    /// Determine if this [`AssetClass`] belongs to the options family of contracts.
    pub fn is_options(&self) -> bool {
        matches!(
            self,
            AssetClass::Options | AssetClass::OptionCombo | AssetClass::FutureCombo
        )
    }

    /// Asset class identifier `&str`, matching the serde snake_case representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Spot => "spot",
            AssetClass::Margin => "margin",
            AssetClass::MarginFunding => "margin_funding",
            AssetClass::Index => "index",
            AssetClass::Binary => "binary",
            AssetClass::PerpetualContract => "perpetual_contract",
            AssetClass::PerpetualSwap => "perpetual_swap",
            AssetClass::Futures => "futures",
            AssetClass::UpsideProfit => "upside_profit",
            AssetClass::DownsideProfit => "downside_profit",
            AssetClass::CoinMarginedFutures => "coin_margined_futures",
            AssetClass::UsdtMarginedFutures => "usdt_margined_futures",
            AssetClass::UsdcMarginedFutures => "usdc_margined_futures",
            AssetClass::Options => "options",
            AssetClass::OptionCombo => "option_combo",
            AssetClass::FutureCombo => "future_combo",
            AssetClass::Spread => "spread",
            AssetClass::LinearContract => "linear_contract",
        }
    }

    /// All supported [`AssetClass`] variants, in stable order.
    pub fn all() -> &'static [AssetClass] {
        &[
            AssetClass::Spot,
            AssetClass::Margin,
            AssetClass::MarginFunding,
            AssetClass::Index,
            AssetClass::Binary,
            AssetClass::PerpetualContract,
            AssetClass::PerpetualSwap,
            AssetClass::Futures,
            AssetClass::UpsideProfit,
            AssetClass::DownsideProfit,
            AssetClass::CoinMarginedFutures,
            AssetClass::UsdtMarginedFutures,
            AssetClass::UsdcMarginedFutures,
            AssetClass::Options,
            AssetClass::OptionCombo,
            AssetClass::FutureCombo,
            AssetClass::Spread,
            AssetClass::LinearContract,
        ]
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = UnknownAssetClass;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        AssetClass::all()
            .iter()
            .find(|asset| asset.as_str().eq_ignore_ascii_case(input))
            .copied()
            .ok_or_else(|| UnknownAssetClass(input.to_string()))
    }
}

/// Error returned when parsing an unrecognised [`AssetClass`] identifier.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[error("unknown asset class: {0}")]
pub struct UnknownAssetClass(pub String);
