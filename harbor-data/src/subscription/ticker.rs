use super::SubscriptionKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Harbor [`Subscription`](super::Subscription) [`SubscriptionKind`] that yields [`Ticker`]
/// [`MarketEvent<T>`](crate::event::MarketEvent) events.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
pub struct Tickers;

impl SubscriptionKind for Tickers {
    type Event = Ticker;

    fn as_str(&self) -> &'static str {
        "tickers"
    }
}

impl std::fmt::Display for Tickers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalised Harbor [`Ticker`] model.
///
/// The [`TickerRegistry`](crate::registry::TickerRegistry) enforces `bid ≤ ask` on publish, with
/// equality tolerated only for margin-funding books.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct Ticker {
    pub bid: Decimal,
    pub bid_size: Decimal,
    pub ask: Decimal,
    pub ask_size: Decimal,
    pub last: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub open_interest: Decimal,
    pub last_updated: DateTime<Utc>,
}
