use crate::event::OrderEvent;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use harbor_instrument::MarketKey;
use serde::{Deserialize, Serialize};

/// One entry in a market's compliance history: the orders submitted at a timestamp.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ComplianceSnapshot {
    pub time: DateTime<Utc>,
    pub orders: Vec<OrderEvent>,
}

/// Ordered history of submitted orders per market, consumed by risk and reporting.
#[derive(Debug, Default)]
pub struct ComplianceManager {
    snapshots: FnvHashMap<MarketKey, Vec<ComplianceSnapshot>>,
}

impl ComplianceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an order into the snapshot for its timestamp, appending a new snapshot when the
    /// timestamp advances.
    pub fn record(&mut self, order: &OrderEvent) {
        let history = self.snapshots.entry(order.meta.key.clone()).or_default();
        match history.last_mut() {
            Some(snapshot) if snapshot.time == order.meta.time => {
                snapshot.orders.push(order.clone());
            }
            _ => history.push(ComplianceSnapshot {
                time: order.meta.time,
                orders: vec![order.clone()],
            }),
        }
    }

    /// The latest snapshot for a market.
    pub fn latest(&self, key: &MarketKey) -> Option<&ComplianceSnapshot> {
        self.snapshots.get(key).and_then(|history| history.last())
    }

    /// The full ordered history for a market.
    pub fn history(&self, key: &MarketKey) -> &[ComplianceSnapshot] {
        self.snapshots
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::test_util::market_key,
        event::{Direction, EventMeta, OrderType},
    };
    use chrono::TimeZone;
    use harbor_exchange::kline::Interval;

    fn order(hour: u32) -> OrderEvent {
        OrderEvent {
            meta: EventMeta::new(
                market_key(),
                Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap(),
                Interval::OneHour,
            ),
            direction: Direction::Buy,
            order_type: OrderType::Market,
            price: 100.0,
            amount: 1.0,
        }
    }

    #[test]
    fn test_record_groups_by_timestamp() {
        let mut manager = ComplianceManager::new();
        manager.record(&order(0));
        manager.record(&order(0));
        manager.record(&order(1));

        let history = manager.history(&market_key());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].orders.len(), 2);
        assert_eq!(manager.latest(&market_key()).unwrap().orders.len(), 1);
    }
}
