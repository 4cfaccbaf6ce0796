use crate::error::VenueError;
use chrono::{DateTime, Utc};
use harbor_instrument::{Side, asset::AssetClass, exchange::VenueId, pair::Pair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client assigned order identifier, generated before submission so fills can be correlated
/// even if the venue acknowledgement is lost.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct ClientOrderId(pub Uuid);

impl ClientOrderId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Venue assigned order identifier, present once the venue has acknowledged the order.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct VenueOrderId(pub smol_str::SmolStr);

impl<S> From<S> for VenueOrderId
where
    S: Into<smol_str::SmolStr>,
{
    fn from(input: S) -> Self {
        Self(input.into())
    }
}

/// Type of an order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

/// Time-in-force of an order.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    #[default]
    GoodTilCancelled,
    ImmediateOrCancel,
    FillOrKill,
    PostOnly,
}

/// Order status lifecycle: `New → PartiallyFilled? → {Filled, Cancelled, Rejected, Expired}`.
///
/// Terminal states tombstone the order: no further transitions are legal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Determine if this [`OrderStatus`] is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Determine if transitioning from this [`OrderStatus`] to `next` is legal.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::New => next != OrderStatus::New,
            OrderStatus::PartiallyFilled => {
                matches!(
                    next,
                    OrderStatus::PartiallyFilled
                        | OrderStatus::Filled
                        | OrderStatus::Cancelled
                        | OrderStatus::Expired
                )
            }
            status if status.is_terminal() => false,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            OrderStatus::New => "new",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Expired => "expired",
        };
        write!(f, "{status}")
    }
}

/// Normalised order record shared across venues.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub client_order_id: ClientOrderId,
    pub venue_order_id: Option<VenueOrderId>,
    pub venue: VenueId,
    pub pair: Pair,
    pub asset: AssetClass,
    pub side: Side,
    pub kind: OrderType,
    pub time_in_force: TimeInForce,
    pub price: Decimal,
    pub amount: Decimal,
    pub filled_amount: Decimal,
    pub average_fill_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Construct a fresh [`Order`] in [`OrderStatus::New`].
    pub fn new(
        venue: VenueId,
        pair: Pair,
        asset: AssetClass,
        side: Side,
        kind: OrderType,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            client_order_id: ClientOrderId::random(),
            venue_order_id: None,
            venue,
            pair,
            asset,
            side,
            kind,
            time_in_force: TimeInForce::default(),
            price,
            amount,
            filled_amount: Decimal::ZERO,
            average_fill_price: Decimal::ZERO,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition this [`Order`] to the provided [`OrderStatus`], enforcing the lifecycle.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), VenueError> {
        if !self.status.can_transition(next) {
            return Err(VenueError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a fill, updating filled amount, average fill price and status.
    pub fn record_fill(&mut self, price: Decimal, amount: Decimal) -> Result<(), VenueError> {
        let next_filled = self.filled_amount + amount;
        if next_filled.is_zero() {
            return Ok(());
        }

        self.average_fill_price =
            (self.average_fill_price * self.filled_amount + price * amount) / next_filled;
        self.filled_amount = next_filled;

        let next_status = if self.filled_amount >= self.amount {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(
            VenueId::BinanceSpot,
            Pair::new("btc", "usdt"),
            AssetClass::Spot,
            Side::Buy,
            OrderType::Limit,
            dec!(100),
            dec!(2),
        )
    }

    #[test]
    fn test_status_lifecycle() {
        struct TestCase {
            from: OrderStatus,
            to: OrderStatus,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: new to partially filled
                from: OrderStatus::New,
                to: OrderStatus::PartiallyFilled,
                expected: true,
            },
            TestCase {
                // TC1: new straight to filled
                from: OrderStatus::New,
                to: OrderStatus::Filled,
                expected: true,
            },
            TestCase {
                // TC2: partially filled to rejected is illegal
                from: OrderStatus::PartiallyFilled,
                to: OrderStatus::Rejected,
                expected: false,
            },
            TestCase {
                // TC3: terminal states are tombstoned
                from: OrderStatus::Filled,
                to: OrderStatus::Cancelled,
                expected: false,
            },
            TestCase {
                // TC4: cancelled is tombstoned
                from: OrderStatus::Cancelled,
                to: OrderStatus::New,
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                test.from.can_transition(test.to),
                test.expected,
                "TC{index} failed"
            );
        }
    }

    #[test]
    fn test_record_fill_partial_then_complete() {
        let mut order = order();

        order.record_fill(dec!(100), dec!(1)).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.average_fill_price, dec!(100));

        order.record_fill(dec!(110), dec!(1)).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_amount, dec!(2));
        assert_eq!(order.average_fill_price, dec!(105));
    }

    #[test]
    fn test_transition_rejects_illegal_move() {
        let mut order = order();
        order.transition(OrderStatus::Filled).unwrap();
        assert!(matches!(
            order.transition(OrderStatus::Cancelled),
            Err(VenueError::InvalidStatusTransition { .. })
        ));
    }
}
