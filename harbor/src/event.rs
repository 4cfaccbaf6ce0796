use chrono::{DateTime, Utc};
use harbor_data::subscription::{candle::Candle, trade::PublicTrade};
use harbor_exchange::kline::Interval;
use harbor_instrument::{MarketKey, Side};
use serde::{Deserialize, Serialize};

/// Metadata common to every backtest event.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventMeta {
    #[serde(flatten)]
    pub key: MarketKey,
    pub time: DateTime<Utc>,
    pub interval: Interval,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EventMeta {
    pub fn new(key: MarketKey, time: DateTime<Utc>, interval: Interval) -> Self {
        Self {
            key,
            time,
            interval,
            reason: None,
        }
    }

    /// Attach a human readable reason, eg/ why an order became `DoNothing`.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Direction of a backtest event, extending order sides with the non-actionable outcomes the
/// pipeline can produce.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
    DoNothing,
    MissingData,
    CouldNotBuy,
    CouldNotSell,
}

impl Direction {
    /// Determine if this [`Direction`] leads to an order.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Direction::Buy | Direction::Sell)
    }

    /// The order [`Side`] of an actionable [`Direction`].
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::Buy => Some(Side::Buy),
            Direction::Sell => Some(Side::Sell),
            _ => None,
        }
    }
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => Direction::Buy,
            Side::Sell => Direction::Sell,
        }
    }
}

/// One tick of market data: a candle, plus the raw trades that formed it when the feed is a
/// trade tape (fills walk the tape in that case).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataTick {
    pub meta: EventMeta,
    pub candle: Candle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<PublicTrade>,
}

/// Advisory signal produced by a strategy for the portfolio to interpret.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    pub meta: EventMeta,
    pub direction: Direction,
    /// Limit price for limit orders; ignored for market orders which price from the tick close.
    pub price: f64,
    pub order_type: OrderType,
}

/// Type of a backtest order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

/// Sized order emitted by the portfolio after funds gating and risk evaluation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderEvent {
    pub meta: EventMeta,
    pub direction: Direction,
    pub order_type: OrderType,
    pub price: f64,
    pub amount: f64,
}

/// Fill generated by the simulated exchange.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FillEvent {
    pub meta: EventMeta,
    pub direction: Direction,
    pub amount: f64,
    /// Volume weighted purchase price including slippage.
    pub purchase_price: f64,
    /// Gross value exchanged: `amount * purchase_price`.
    pub total: f64,
    pub fee: f64,
    pub slippage_cost: f64,
}

/// Backtest event union routed by the engine queue.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Event {
    Data(DataTick),
    Signal(Signal),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    /// Metadata of the wrapped event.
    pub fn meta(&self) -> &EventMeta {
        match self {
            Event::Data(data) => &data.meta,
            Event::Signal(signal) => &signal.meta,
            Event::Order(order) => &order.meta,
            Event::Fill(fill) => &fill.meta,
        }
    }

    /// Stable routing priority: `data < signal < order < fill` for equal timestamps.
    pub fn kind_priority(&self) -> u8 {
        match self {
            Event::Data(_) => 0,
            Event::Signal(_) => 1,
            Event::Order(_) => 2,
            Event::Fill(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_actionability() {
        assert!(Direction::Buy.is_actionable());
        assert!(Direction::Sell.is_actionable());
        for direction in [
            Direction::DoNothing,
            Direction::MissingData,
            Direction::CouldNotBuy,
            Direction::CouldNotSell,
        ] {
            assert!(!direction.is_actionable());
            assert_eq!(direction.side(), None);
        }
    }
}
