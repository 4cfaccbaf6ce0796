#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Harbor-Instrument
//! Core Harbor venue, currency pair and asset class data structures and associated utilities.
//!
//! Every other Harbor crate consumes these types to identify what is being traded and where:
//! * **Venue**: [`VenueId`](exchange::VenueId) identifies the exchange server data originates from.
//! * **Pair**: ordered `(base, quote)` [`Pair`](pair::Pair) of normalised [`Symbol`](symbol::Symbol)s
//!   with venue display formats that round-trip.
//! * **Asset class**: the contract family of a market ([`AssetClass`](asset::AssetClass)).
//! * **Pair stores**: per venue, per asset class sets of available and enabled [`Pair`](pair::Pair)s
//!   upholding the `enabled ⊆ available` invariant.

use serde::{Deserialize, Serialize};

/// [`AssetClass`](asset::AssetClass) contract family enum and predicates.
pub mod asset;

/// [`VenueId`](exchange::VenueId) identifiers for supported venues.
pub mod exchange;

/// Normalised currency [`Pair`](pair::Pair), display [`PairFormat`](pair::PairFormat), and the
/// per-venue [`PairManager`](pair::store::PairManager).
pub mod pair;

/// Interned lowercase currency code [`Symbol`](symbol::Symbol).
pub mod symbol;

use crate::{asset::AssetClass, exchange::VenueId, pair::Pair};

/// Unique key for a market: the venue it trades on, the contract family, and the currency pair.
///
/// Process-wide registries (tickers, orderbooks) deduplicate by this key.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct MarketKey {
    pub venue: VenueId,
    pub asset: AssetClass,
    pub pair: Pair,
}

impl MarketKey {
    /// Construct a new [`MarketKey`] from the provided venue, asset class and pair.
    pub fn new(venue: VenueId, asset: AssetClass, pair: Pair) -> Self {
        Self { venue, asset, pair }
    }
}

impl std::fmt::Display for MarketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.venue, self.asset, self.pair)
    }
}

/// Side of a trade or order: buyer or seller.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "s")]
    Sell,
}

impl Side {
    /// Return the opposite [`Side`].
    pub fn invert(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}
