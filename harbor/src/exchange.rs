use crate::{
    config::CurrencySettings,
    event::{DataTick, Direction, FillEvent, OrderEvent, OrderType},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

/// Simulated exchange: fills sized orders against data ticks with a bounded slippage model and
/// maker/taker fees.
///
/// Slippage draws uniformly from `[min_slippage_percent, max_slippage_percent]` using a seeded
/// RNG, so identical configurations produce identical fills.
#[derive(Debug)]
pub struct SimulatedExchange {
    rng: StdRng,
}

impl SimulatedExchange {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Attempt to fill an order against the provided [`DataTick`].
    ///
    /// Market orders price from the tick close. Limit orders require the tick's range to reach
    /// the limit price, otherwise no fill occurs this tick. Trade-tape ticks fill by walking
    /// the tape up to the order amount.
    pub fn fill(
        &mut self,
        order: &OrderEvent,
        tick: &DataTick,
        settings: &CurrencySettings,
    ) -> Option<FillEvent> {
        let base_price = match order.order_type {
            OrderType::Market => tick.candle.close,
            OrderType::Limit => {
                let reachable = match order.direction {
                    Direction::Buy => tick.candle.low <= order.price,
                    Direction::Sell => tick.candle.high >= order.price,
                    _ => false,
                };
                if !reachable {
                    debug!(price = order.price, "limit order not reachable this tick");
                    return None;
                }
                order.price
            }
        };

        let (amount, tape_price) = if tick.trades.is_empty() {
            (order.amount, base_price)
        } else {
            walk_tape(order, tick, base_price)
        };
        if amount <= 0.0 {
            return None;
        }

        // Slippage moves the price adversely within the configured bounds
        let slippage_pct = self
            .rng
            .random_range(settings.min_slippage_percent..=settings.max_slippage_percent);
        let slip = tape_price * slippage_pct / 100.0;
        let purchase_price = match order.direction {
            Direction::Buy => tape_price + slip,
            Direction::Sell => tape_price - slip,
            _ => return None,
        };

        let total = purchase_price * amount;
        let fee_rate = match order.order_type {
            OrderType::Limit => settings.maker_fee,
            OrderType::Market => settings.taker_fee,
        };

        Some(FillEvent {
            meta: tick.meta.clone(),
            direction: order.direction,
            amount,
            purchase_price,
            total,
            fee: total * fee_rate,
            slippage_cost: slip * amount,
        })
    }
}

/// Walk the trade tape, accumulating volume up to the order amount, and return the filled
/// amount with its volume weighted price.
fn walk_tape(order: &OrderEvent, tick: &DataTick, fallback_price: f64) -> (f64, f64) {
    let mut remaining = order.amount;
    let mut notional = 0.0;
    let mut filled = 0.0;

    for trade in &tick.trades {
        if remaining <= 0.0 {
            break;
        }
        let take = trade.amount.min(remaining);
        notional += take * trade.price;
        filled += take;
        remaining -= take;
    }

    if filled <= 0.0 {
        (order.amount.min(tick.candle.volume), fallback_price)
    } else {
        (filled, notional / filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MinMax,
        data::test_util::{market_key, tick},
        event::EventMeta,
    };
    use harbor_data::subscription::trade::PublicTrade;
    use harbor_exchange::kline::Interval;
    use harbor_instrument::{Side, asset::AssetClass, exchange::VenueId, symbol::Symbol};

    fn settings(min_slip: f64, max_slip: f64) -> CurrencySettings {
        CurrencySettings {
            venue: VenueId::BinanceSpot,
            asset: AssetClass::Spot,
            base: Symbol::new("btc"),
            quote: Symbol::new("usdt"),
            initial_base_funds: 0.0,
            initial_quote_funds: 1000.0,
            buy_side: MinMax::default(),
            sell_side: MinMax::default(),
            maker_fee: 0.001,
            taker_fee: 0.002,
            min_slippage_percent: min_slip,
            max_slippage_percent: max_slip,
            use_exchange_order_limits: false,
            skip_candle_volume_fit_check: false,
        }
    }

    fn order(direction: Direction, order_type: OrderType, price: f64, amount: f64) -> OrderEvent {
        OrderEvent {
            meta: EventMeta::new(market_key(), Default::default(), Interval::OneHour),
            direction,
            order_type,
            price,
            amount,
        }
    }

    #[test]
    fn test_market_order_fills_from_close_with_fees() {
        let mut exchange = SimulatedExchange::new(42);
        let fill = exchange
            .fill(
                &order(Direction::Buy, OrderType::Market, 0.0, 2.0),
                &tick(0, 100.0),
                &settings(0.0, 0.000001),
            )
            .unwrap();

        assert_eq!(fill.amount, 2.0);
        assert!((fill.purchase_price - 100.0).abs() < 0.01);
        assert!((fill.fee - fill.total * 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn test_limit_order_requires_reachable_price() {
        let mut exchange = SimulatedExchange::new(42);
        let tick = tick(0, 100.0); // low = 99, high = 101

        // Buy limit below the low never fills this tick
        assert!(
            exchange
                .fill(
                    &order(Direction::Buy, OrderType::Limit, 90.0, 1.0),
                    &tick,
                    &settings(0.0, 0.000001),
                )
                .is_none()
        );

        // Buy limit within range fills at the limit price (maker fee)
        let fill = exchange
            .fill(
                &order(Direction::Buy, OrderType::Limit, 100.0, 1.0),
                &tick,
                &settings(0.0, 0.000001),
            )
            .unwrap();
        assert!((fill.purchase_price - 100.0).abs() < 0.01);
        assert!((fill.fee - fill.total * 0.001).abs() < f64::EPSILON);
    }

    #[test]
    fn test_slippage_moves_price_adversely_within_bounds() {
        let mut exchange = SimulatedExchange::new(42);
        let settings = settings(1.0, 2.0);

        let buy = exchange
            .fill(
                &order(Direction::Buy, OrderType::Market, 0.0, 1.0),
                &tick(0, 100.0),
                &settings,
            )
            .unwrap();
        assert!(buy.purchase_price >= 101.0 && buy.purchase_price <= 102.0);

        let sell_tick = tick(0, 100.0);
        let mut exchange = SimulatedExchange::new(42);
        let sell = exchange
            .fill(
                &order(Direction::Sell, OrderType::Market, 0.0, 1.0),
                &sell_tick,
                &settings,
            )
            .unwrap();
        assert!(sell.purchase_price <= 99.0 && sell.purchase_price >= 98.0);
    }

    #[test]
    fn test_identical_seeds_fill_identically() {
        let settings = settings(0.5, 1.5);
        let order = order(Direction::Buy, OrderType::Market, 0.0, 1.0);

        let mut a = SimulatedExchange::new(7);
        let mut b = SimulatedExchange::new(7);
        assert_eq!(
            a.fill(&order, &tick(0, 100.0), &settings),
            b.fill(&order, &tick(0, 100.0), &settings),
        );
    }

    #[test]
    fn test_tape_walking_fills_up_to_order_amount() {
        let mut exchange = SimulatedExchange::new(42);
        let mut data = tick(0, 100.0);
        data.trades = vec![
            PublicTrade {
                id: "1".to_string(),
                price: 100.0,
                amount: 1.0,
                side: Side::Sell,
            },
            PublicTrade {
                id: "2".to_string(),
                price: 102.0,
                amount: 1.0,
                side: Side::Sell,
            },
            PublicTrade {
                id: "3".to_string(),
                price: 104.0,
                amount: 5.0,
                side: Side::Sell,
            },
        ];

        let fill = exchange
            .fill(
                &order(Direction::Buy, OrderType::Market, 0.0, 2.0),
                &data,
                &settings(0.0, 0.000001),
            )
            .unwrap();

        // Walked 1.0 @ 100 and 1.0 @ 102: VWAP 101
        assert_eq!(fill.amount, 2.0);
        assert!((fill.purchase_price - 101.0).abs() < 0.01);
    }
}
