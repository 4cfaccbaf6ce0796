use super::SubscriptionKind;
use harbor_instrument::Side;
use serde::{Deserialize, Serialize};

/// Harbor [`Subscription`](super::Subscription) [`SubscriptionKind`] that yields [`PublicTrade`]
/// [`MarketEvent<T>`](crate::event::MarketEvent) events.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
pub struct PublicTrades;

impl SubscriptionKind for PublicTrades {
    type Event = PublicTrade;

    fn as_str(&self) -> &'static str {
        "public_trades"
    }
}

impl std::fmt::Display for PublicTrades {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalised Harbor [`PublicTrade`] model.
///
/// Venue decoders normalise at ingress: a trade reported with negative price or amount has the
/// magnitudes flipped positive and its side inverted before it leaves the decoder.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct PublicTrade {
    pub id: String,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
}

impl PublicTrade {
    /// Normalise a trade with negative price or amount to positive magnitudes, inverting the
    /// side when the amount was negative.
    pub fn normalise(mut self) -> Self {
        if self.amount < 0.0 {
            self.amount = self.amount.abs();
            self.side = self.side.invert();
        }
        if self.price < 0.0 {
            self.price = self.price.abs();
        }
        self
    }
}
