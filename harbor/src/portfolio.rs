use crate::{
    config::{CurrencySettings, MinMax, PortfolioSettings},
    event::{DataTick, Direction, EventMeta, OrderEvent, OrderType, Signal},
    funding::{FundManager, PoolId},
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use harbor_instrument::MarketKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot of one market's funds and position at a point in time. Monotone in `time`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Holding {
    pub time: DateTime<Utc>,
    pub initial_funds: f64,
    pub remaining_funds: f64,
    pub position_size: f64,
    pub position_value: f64,
    pub realized_pnl: f64,
    pub total_value: f64,
    pub fees_paid: f64,
    pub slippage_cost: f64,
}

/// Per market state the portfolio tracks.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub settings: CurrencySettings,
    pub holding: Holding,
}

/// Gating and sizing stage: turns strategy [`Signal`]s into sized [`OrderEvent`]s, or into
/// non-actionable directions with reasons when funds or position are insufficient.
#[derive(Debug)]
pub struct Portfolio {
    settings: PortfolioSettings,
    markets: FnvHashMap<MarketKey, MarketState>,
}

/// Outcome of portfolio evaluation of one [`Signal`].
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Order(OrderEvent),
    /// The signal could not be acted on; the direction and reason explain why.
    NoAction { meta: EventMeta, direction: Direction },
}

impl Portfolio {
    pub fn new(
        settings: PortfolioSettings,
        markets: impl IntoIterator<Item = (MarketKey, CurrencySettings)>,
    ) -> Self {
        let markets = markets
            .into_iter()
            .map(|(key, settings)| {
                let initial_funds = settings.initial_quote_funds;
                (
                    key,
                    MarketState {
                        settings,
                        holding: Holding {
                            initial_funds,
                            remaining_funds: initial_funds,
                            total_value: initial_funds,
                            ..Default::default()
                        },
                    },
                )
            })
            .collect();

        Self { settings, markets }
    }

    /// The latest [`Holding`] snapshot for a market.
    pub fn holding(&self, key: &MarketKey) -> Option<&Holding> {
        self.markets.get(key).map(|state| &state.holding)
    }

    /// The configured [`CurrencySettings`] for a market.
    pub fn settings(&self, key: &MarketKey) -> Option<&CurrencySettings> {
        self.markets.get(key).map(|state| &state.settings)
    }

    /// Evaluate a [`Signal`] against the market's holding and funding, producing a sized order
    /// or a gated outcome.
    pub fn evaluate(
        &self,
        signal: &Signal,
        tick: &DataTick,
        funding: &FundManager,
    ) -> Evaluation {
        let Some(state) = self.markets.get(&signal.meta.key) else {
            return Evaluation::NoAction {
                meta: signal.meta.clone().with_reason("market not configured"),
                direction: Direction::MissingData,
            };
        };

        match signal.direction {
            Direction::Buy => self.evaluate_buy(signal, tick, state, funding),
            Direction::Sell => self.evaluate_sell(signal, tick, state),
            direction => Evaluation::NoAction {
                meta: signal.meta.clone(),
                direction,
            },
        }
    }

    fn evaluate_buy(
        &self,
        signal: &Signal,
        tick: &DataTick,
        state: &MarketState,
        funding: &FundManager,
    ) -> Evaluation {
        let key = &signal.meta.key;
        let quote_pool = funding.pool_id(key.venue, key.asset, &key.pair, &key.pair.quote);
        let available = self.available_quote_funds(state, funding, &quote_pool);

        if available <= 0.0 {
            return Evaluation::NoAction {
                meta: signal
                    .meta
                    .clone()
                    .with_reason("no remaining funds to buy with"),
                direction: Direction::CouldNotBuy,
            };
        }

        let price = order_price(signal, tick);
        if price <= 0.0 {
            return Evaluation::NoAction {
                meta: signal.meta.clone().with_reason("tick carries no price"),
                direction: Direction::MissingData,
            };
        }

        // Size against the worst-case cost per unit so fees and slippage cannot overdraw funds
        let unit_cost = price * cost_buffer(&state.settings);
        let amount = size_order(
            available * self.settings.leverage / unit_cost,
            &state.settings.buy_side,
            &self.settings.buy_side,
        );
        if amount <= 0.0 {
            return Evaluation::NoAction {
                meta: signal
                    .meta
                    .clone()
                    .with_reason("sized amount below configured minimum"),
                direction: Direction::CouldNotBuy,
            };
        }

        Evaluation::Order(OrderEvent {
            meta: signal.meta.clone(),
            direction: Direction::Buy,
            order_type: signal.order_type,
            price,
            amount,
        })
    }

    fn evaluate_sell(&self, signal: &Signal, tick: &DataTick, state: &MarketState) -> Evaluation {
        if state.holding.position_size <= 0.0 {
            return Evaluation::NoAction {
                meta: signal.meta.clone().with_reason("no position to sell"),
                direction: Direction::CouldNotSell,
            };
        }

        let price = order_price(signal, tick);
        let amount = size_order(
            state.holding.position_size,
            &state.settings.sell_side,
            &self.settings.sell_side,
        );
        if amount <= 0.0 {
            return Evaluation::NoAction {
                meta: signal
                    .meta
                    .clone()
                    .with_reason("sized amount below configured minimum"),
                direction: Direction::CouldNotSell,
            };
        }

        Evaluation::Order(OrderEvent {
            meta: signal.meta.clone(),
            direction: Direction::Sell,
            order_type: signal.order_type,
            price,
            amount,
        })
    }

    fn available_quote_funds(
        &self,
        state: &MarketState,
        funding: &FundManager,
        quote_pool: &PoolId,
    ) -> f64 {
        match funding.pool(quote_pool) {
            Some(_) => funding.available(quote_pool),
            // No registered pool: fall back to the holding snapshot
            None => state.holding.remaining_funds,
        }
    }

    /// Apply a fill to the market's [`Holding`], keeping the snapshot monotone in time.
    pub fn update_from_fill(
        &mut self,
        key: &MarketKey,
        time: DateTime<Utc>,
        direction: Direction,
        amount: f64,
        total: f64,
        fee: f64,
        slippage_cost: f64,
        mark_price: f64,
    ) {
        let Some(state) = self.markets.get_mut(key) else {
            debug!(%key, "fill for unconfigured market ignored");
            return;
        };

        let holding = &mut state.holding;
        match direction {
            Direction::Buy => {
                holding.remaining_funds -= total + fee;
                holding.position_size += amount;
            }
            Direction::Sell => {
                let cost_basis = mark_price * amount;
                holding.remaining_funds += total - fee;
                holding.position_size -= amount;
                holding.realized_pnl += total - fee - cost_basis;
            }
            _ => return,
        }

        holding.fees_paid += fee;
        holding.slippage_cost += slippage_cost;
        holding.position_value = holding.position_size * mark_price;
        holding.total_value = holding.remaining_funds + holding.position_value;
        holding.time = holding.time.max(time);
    }

    /// Re-mark position value from the latest tick close.
    pub fn update_from_market(&mut self, key: &MarketKey, time: DateTime<Utc>, close: f64) {
        if let Some(state) = self.markets.get_mut(key) {
            let holding = &mut state.holding;
            holding.position_value = holding.position_size * close;
            holding.total_value = holding.remaining_funds + holding.position_value;
            holding.time = holding.time.max(time);
        }
    }
}

/// Worst-case cost multiplier of one unit at the quoted price, covering maximum slippage plus
/// the larger fee rate.
pub fn cost_buffer(settings: &CurrencySettings) -> f64 {
    (1.0 + settings.max_slippage_percent / 100.0)
        * (1.0 + settings.taker_fee.max(settings.maker_fee))
}

/// The price an order would execute around: tick close for market orders, the signal price for
/// limit orders.
fn order_price(signal: &Signal, tick: &DataTick) -> f64 {
    match signal.order_type {
        OrderType::Market => tick.candle.close,
        OrderType::Limit => signal.price,
    }
}

/// Clamp a candidate order size into the configured per market and global bounds.
fn size_order(candidate: f64, market_side: &MinMax, global_side: &MinMax) -> f64 {
    let mut amount = candidate;
    for bounds in [market_side, global_side] {
        if bounds.maximum_size > 0.0 {
            amount = amount.min(bounds.maximum_size);
        }
    }
    for bounds in [market_side, global_side] {
        if bounds.minimum_size > 0.0 && amount < bounds.minimum_size {
            return 0.0;
        }
    }
    amount
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::test_util::{market_key, tick},
        funding::FundingMode,
    };
    use harbor_exchange::kline::Interval;
    use harbor_instrument::{asset::AssetClass, exchange::VenueId, symbol::Symbol};

    fn currency_settings(initial_quote: f64) -> CurrencySettings {
        CurrencySettings {
            venue: VenueId::BinanceSpot,
            asset: AssetClass::Spot,
            base: Symbol::new("btc"),
            quote: Symbol::new("usdt"),
            initial_base_funds: 0.0,
            initial_quote_funds: initial_quote,
            buy_side: MinMax::default(),
            sell_side: MinMax::default(),
            maker_fee: 0.0,
            taker_fee: 0.0,
            min_slippage_percent: 0.0,
            max_slippage_percent: 0.1,
            use_exchange_order_limits: false,
            skip_candle_volume_fit_check: false,
        }
    }

    fn signal(direction: Direction) -> Signal {
        Signal {
            meta: EventMeta::new(
                market_key(),
                Default::default(),
                Interval::OneHour,
            ),
            direction,
            price: 0.0,
            order_type: OrderType::Market,
        }
    }

    fn portfolio(initial_quote: f64) -> Portfolio {
        Portfolio::new(
            PortfolioSettings::default(),
            [(market_key(), currency_settings(initial_quote))],
        )
    }

    #[test]
    fn test_sell_with_zero_position_is_could_not_sell() {
        let portfolio = portfolio(1000.0);
        let funding = FundManager::new(FundingMode::PerPair);

        let evaluation = portfolio.evaluate(&signal(Direction::Sell), &tick(0, 100.0), &funding);
        assert!(matches!(
            evaluation,
            Evaluation::NoAction {
                direction: Direction::CouldNotSell,
                ..
            }
        ));
    }

    #[test]
    fn test_buy_with_no_funds_is_could_not_buy() {
        let portfolio = portfolio(0.0);
        let funding = FundManager::new(FundingMode::PerPair);

        let evaluation = portfolio.evaluate(&signal(Direction::Buy), &tick(0, 100.0), &funding);
        assert!(matches!(
            evaluation,
            Evaluation::NoAction {
                direction: Direction::CouldNotBuy,
                ..
            }
        ));
    }

    #[test]
    fn test_buy_produces_sized_order() {
        let portfolio = portfolio(1000.0);
        let funding = FundManager::new(FundingMode::PerPair);

        let evaluation = portfolio.evaluate(&signal(Direction::Buy), &tick(0, 100.0), &funding);
        let Evaluation::Order(order) = evaluation else {
            panic!("expected an order");
        };
        assert_eq!(order.direction, Direction::Buy);
        assert_eq!(order.price, 100.0);
        // Sized against worst-case unit cost: 1000 / (100 * cost_buffer)
        let expected = 1000.0 / (100.0 * cost_buffer(&currency_settings(1000.0)));
        assert!((order.amount - expected).abs() < 1e-12);
    }

    #[test]
    fn test_fill_updates_holding_and_enables_sell() {
        let mut portfolio = portfolio(1000.0);
        let funding = FundManager::new(FundingMode::PerPair);

        portfolio.update_from_fill(
            &market_key(),
            Default::default(),
            Direction::Buy,
            5.0,
            500.0,
            1.0,
            0.5,
            100.0,
        );

        let holding = portfolio.holding(&market_key()).unwrap();
        assert_eq!(holding.position_size, 5.0);
        assert_eq!(holding.remaining_funds, 499.0);
        assert_eq!(holding.fees_paid, 1.0);

        let evaluation = portfolio.evaluate(&signal(Direction::Sell), &tick(0, 100.0), &funding);
        assert!(matches!(evaluation, Evaluation::Order(_)));
    }

    #[test]
    fn test_size_order_respects_bounds() {
        let market_side = MinMax {
            minimum_size: 1.0,
            maximum_size: 5.0,
            maximum_total: 0.0,
        };
        let global_side = MinMax::default();

        assert_eq!(size_order(10.0, &market_side, &global_side), 5.0);
        assert_eq!(size_order(0.5, &market_side, &global_side), 0.0);
        assert_eq!(size_order(3.0, &market_side, &global_side), 3.0);
    }
}
