use crate::{
    compliance::ComplianceManager,
    event::{Direction, OrderEvent},
    portfolio::Holding,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome of risk evaluation of one sized order.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    /// Order passes unchanged.
    Pass(OrderEvent),
    /// Order passes with a reduced size.
    Reduced(OrderEvent),
    /// Order vetoed; converted to `DoNothing` with the contained reason.
    Veto { order: OrderEvent, reason: String },
}

/// Risk configuration applied to every sized order before it reaches the exchange.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskSettings {
    /// Maximum order notional as a fraction of the market's total holding value.
    /// Zero disables the check.
    pub max_order_value_fraction: f64,
    /// Hard cap on single order notional. Zero disables the check.
    pub max_order_notional: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_order_value_fraction: 0.0,
            max_order_notional: 0.0,
        }
    }
}

/// Inspects sized orders against current holdings and the compliance history; may reduce,
/// veto, or pass them through.
#[derive(Debug, Default)]
pub struct RiskManager {
    settings: RiskSettings,
}

impl RiskManager {
    pub fn new(settings: RiskSettings) -> Self {
        Self { settings }
    }

    /// Evaluate a sized order. Vetoed orders are reported with a reason the engine converts
    /// into a `DoNothing` outcome; the loop continues either way.
    pub fn evaluate(
        &self,
        order: OrderEvent,
        holding: Option<&Holding>,
        _compliance: &ComplianceManager,
    ) -> RiskDecision {
        if !order.direction.is_actionable() {
            return RiskDecision::Veto {
                order,
                reason: "order direction is not actionable".to_string(),
            };
        }

        let notional = order.price * order.amount;
        if self.settings.max_order_notional > 0.0 && notional > self.settings.max_order_notional {
            let reduced_amount = self.settings.max_order_notional / order.price;
            debug!(
                notional,
                cap = self.settings.max_order_notional,
                "risk reduced order size to notional cap"
            );
            return RiskDecision::Reduced(OrderEvent {
                amount: reduced_amount,
                ..order
            });
        }

        if self.settings.max_order_value_fraction > 0.0 {
            if let Some(holding) = holding {
                let cap = holding.total_value * self.settings.max_order_value_fraction;
                if cap <= 0.0 {
                    return RiskDecision::Veto {
                        order,
                        reason: "holding has no value to risk".to_string(),
                    };
                }
                if notional > cap {
                    let reduced_amount = cap / order.price;
                    return RiskDecision::Reduced(OrderEvent {
                        amount: reduced_amount,
                        ..order
                    });
                }
            }
        }

        RiskDecision::Pass(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::test_util::market_key, event::{EventMeta, OrderType}};
    use harbor_exchange::kline::Interval;

    fn order(price: f64, amount: f64) -> OrderEvent {
        OrderEvent {
            meta: EventMeta::new(market_key(), Default::default(), Interval::OneHour),
            direction: Direction::Buy,
            order_type: OrderType::Market,
            price,
            amount,
        }
    }

    #[test]
    fn test_pass_through_with_defaults() {
        let manager = RiskManager::default();
        let decision = manager.evaluate(order(100.0, 5.0), None, &ComplianceManager::default());
        assert!(matches!(decision, RiskDecision::Pass(_)));
    }

    #[test]
    fn test_notional_cap_reduces_order() {
        let manager = RiskManager::new(RiskSettings {
            max_order_notional: 200.0,
            ..Default::default()
        });

        let decision = manager.evaluate(order(100.0, 5.0), None, &ComplianceManager::default());
        let RiskDecision::Reduced(reduced) = decision else {
            panic!("expected a reduced order");
        };
        assert_eq!(reduced.amount, 2.0);
    }

    #[test]
    fn test_zero_value_holding_vetoes() {
        let manager = RiskManager::new(RiskSettings {
            max_order_value_fraction: 0.5,
            ..Default::default()
        });
        let holding = Holding::default();

        let decision = manager.evaluate(
            order(100.0, 5.0),
            Some(&holding),
            &ComplianceManager::default(),
        );
        assert!(matches!(decision, RiskDecision::Veto { .. }));
    }
}
