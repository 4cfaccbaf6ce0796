use crate::{
    compliance::ComplianceManager,
    config::BacktestConfig,
    data::DataHandler,
    error::EngineError,
    event::{DataTick, Direction, Event, OrderEvent, Signal},
    exchange::SimulatedExchange,
    funding::{FundManager, FundingMode, PoolId, Reservation},
    portfolio::{Evaluation, Portfolio},
    queue::EventQueue,
    risk::{RiskDecision, RiskManager, RiskSettings},
    statistic::StatisticRegistry,
    strategy::Strategy,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use harbor_instrument::MarketKey;
use tracing::{debug, info, warn};

/// The single-threaded discrete-event backtest engine.
///
/// One "tick" pops the next event off the deterministic queue, routes it by tag, applies side
/// effects, and enqueues derived events. Business outcomes (`could_not_buy`, `do_nothing`, ...)
/// continue the loop; only framework errors halt it. No parallelism is used anywhere, so runs
/// with identical inputs are reproducible.
#[derive(Debug)]
pub struct Engine {
    feeds: Vec<Box<dyn DataHandler>>,
    strategy: Box<dyn Strategy>,
    portfolio: Portfolio,
    risk: RiskManager,
    exchange: SimulatedExchange,
    funding: FundManager,
    compliance: ComplianceManager,
    statistics: StatisticRegistry,
    config: BacktestConfig,
    simultaneous: bool,
    pending_orders: FnvHashMap<MarketKey, Vec<PendingOrder>>,
    last_time: FnvHashMap<MarketKey, DateTime<Utc>>,
}

#[derive(Debug)]
struct PendingOrder {
    order: OrderEvent,
    reservation: Option<Reservation>,
}

impl Engine {
    /// Assemble an [`Engine`] from validated configuration, loaded feeds and a strategy.
    pub fn new(
        config: BacktestConfig,
        feeds: Vec<Box<dyn DataHandler>>,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, EngineError> {
        config.validate(strategy.requires_exchange_level_funding())?;

        let keys = feeds
            .iter()
            .map(|feed| feed.key().clone())
            .collect::<Vec<_>>();

        // Seed funding pools per the configured mode
        let mode = if config.funding_settings.use_exchange_level_funding {
            FundingMode::ExchangeLevel
        } else {
            FundingMode::PerPair
        };
        let mut funding = FundManager::new(mode);
        match mode {
            FundingMode::PerPair => {
                for settings in &config.currency_settings {
                    let pair =
                        harbor_instrument::pair::Pair::new(settings.base.clone(), settings.quote.clone());
                    if settings.initial_quote_funds > 0.0 {
                        let id = funding.pool_id(
                            settings.venue,
                            settings.asset,
                            &pair,
                            &settings.quote,
                        );
                        funding.register(id, settings.initial_quote_funds);
                    }
                    if settings.initial_base_funds > 0.0 {
                        let id = funding.pool_id(
                            settings.venue,
                            settings.asset,
                            &pair,
                            &settings.base,
                        );
                        funding.register(id, settings.initial_base_funds);
                    }
                }
            }
            FundingMode::ExchangeLevel => {
                for pool in &config.funding_settings.exchange_level_funding {
                    let id = PoolId {
                        venue: pool.venue,
                        asset: pool.asset,
                        currency: pool.currency.clone(),
                        scope: None,
                    };
                    funding.register(id, pool.initial_funds);
                }
            }
        }

        let markets = config.currency_settings.iter().map(|settings| {
            (
                MarketKey::new(
                    settings.venue,
                    settings.asset,
                    harbor_instrument::pair::Pair::new(
                        settings.base.clone(),
                        settings.quote.clone(),
                    ),
                ),
                settings.clone(),
            )
        });

        let simultaneous = config.strategy_settings.simultaneous_signal_processing;
        if simultaneous && !strategy.supports_simultaneous_processing() {
            return Err(EngineError::SimultaneousUnsupported);
        }

        Ok(Self {
            portfolio: Portfolio::new(config.portfolio_settings.clone(), markets),
            risk: RiskManager::new(RiskSettings::default()),
            exchange: SimulatedExchange::new(config.statistic_settings.slippage_seed),
            funding,
            compliance: ComplianceManager::new(),
            statistics: StatisticRegistry::new(keys, config.statistic_settings.risk_free_rate),
            strategy,
            feeds,
            config,
            simultaneous,
            pending_orders: FnvHashMap::default(),
            last_time: FnvHashMap::default(),
        })
    }

    /// Load every feed and run the event loop to exhaustion.
    pub fn run(&mut self) -> Result<(), EngineError> {
        let mut queue = EventQueue::new();
        for feed in &mut self.feeds {
            feed.load()?;
            while let Some(tick) = feed.next() {
                queue.push(Event::Data(tick));
            }
        }
        info!(events = queue.len(), "backtest event loop starting");

        // Drain data events grouped by timestamp so simultaneous strategies see every market's
        // tick of one instant together
        let mut group: Vec<DataTick> = Vec::new();
        while let Some(event) = queue.pop() {
            let Event::Data(tick) = event else {
                continue;
            };

            let flush = group
                .first()
                .is_some_and(|first| first.meta.time != tick.meta.time);
            if flush {
                let ready = std::mem::take(&mut group);
                self.process_group(ready)?;
            }
            group.push(tick);
        }
        if !group.is_empty() {
            self.process_group(group)?;
        }

        // Release reservations of orders that never found a matching tick
        for (_, pending) in self.pending_orders.drain() {
            for pending_order in pending {
                if let Some(reservation) = pending_order.reservation {
                    self.funding.release(reservation)?;
                }
            }
        }

        info!("backtest event loop complete");
        Ok(())
    }

    /// The statistics registry of this run.
    pub fn statistics(&self) -> &StatisticRegistry {
        &self.statistics
    }

    /// The validated configuration this run was assembled from.
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    fn process_group(&mut self, ticks: Vec<DataTick>) -> Result<(), EngineError> {
        // Ingest: fills against this tick happen before new signals are generated from it
        for tick in &ticks {
            self.ingest_tick(tick)?;
        }

        // Strategy dispatch
        let signals = if self.simultaneous {
            self.strategy
                .on_simultaneous_signals(&ticks, &self.portfolio, &self.funding)?
        } else {
            let mut signals = Vec::with_capacity(ticks.len());
            for tick in &ticks {
                signals.push(
                    self.strategy
                        .on_signal(tick, &self.portfolio, &self.funding)?,
                );
            }
            signals
        };

        // Portfolio, risk, and order placement per signal
        for signal in signals {
            let Some(tick) = ticks
                .iter()
                .find(|tick| tick.meta.key == signal.meta.key)
            else {
                warn!(key = %signal.meta.key, "signal for market with no tick in group");
                continue;
            };
            self.process_signal(signal, tick)?;
        }

        Ok(())
    }

    fn ingest_tick(&mut self, tick: &DataTick) -> Result<(), EngineError> {
        let key = &tick.meta.key;

        // Event time per market is monotonically non-decreasing
        if let Some(last) = self.last_time.get(key) {
            if tick.meta.time < *last {
                return Err(EngineError::TimeRegression {
                    key: key.clone(),
                    time: tick.meta.time,
                });
            }
        }
        self.last_time.insert(key.clone(), tick.meta.time);

        self.statistics.add_data_event_for_time(tick)?;
        self.portfolio
            .update_from_market(key, tick.meta.time, tick.candle.close);

        // Fill orders placed on earlier ticks against this tick's OHLC / tape
        let pending = self.pending_orders.remove(key).unwrap_or_default();
        for pending_order in pending {
            self.try_fill(pending_order, tick)?;
        }

        // Re-attach the post-fill holding snapshot to this tick
        if let Some(holding) = self.portfolio.holding(key).cloned() {
            self.statistics
                .add_holdings_for_time(key, tick.meta.time, &holding)?;
        }
        Ok(())
    }

    fn try_fill(&mut self, pending: PendingOrder, tick: &DataTick) -> Result<(), EngineError> {
        let key = &tick.meta.key;
        let Some(settings) = self.portfolio.settings(key).cloned() else {
            if let Some(reservation) = pending.reservation {
                self.funding.release(reservation)?;
            }
            return Ok(());
        };

        match self.exchange.fill(&pending.order, tick, &settings) {
            Some(mut fill) => {
                // Funding: consume the buy-side reservation, credit sale proceeds
                match fill.direction {
                    Direction::Buy => {
                        if let Some(reservation) = pending.reservation {
                            // The market may have moved since the order was sized: scale the
                            // fill down so the reserved funds are never overdrawn
                            let cost = fill.total + fill.fee;
                            if cost > reservation.amount && cost > 0.0 {
                                let factor = reservation.amount / cost;
                                fill.amount *= factor;
                                fill.total *= factor;
                                fill.fee *= factor;
                                fill.slippage_cost *= factor;
                            }
                            self.funding.consume(reservation, fill.total + fill.fee)?;
                        }
                    }
                    Direction::Sell => {
                        let quote_pool =
                            self.funding
                                .pool_id(key.venue, key.asset, &key.pair, &key.pair.quote);
                        if self.funding.pool(&quote_pool).is_some() {
                            self.funding.credit(&quote_pool, fill.total - fill.fee)?;
                        }
                    }
                    _ => {}
                }

                self.portfolio.update_from_fill(
                    key,
                    fill.meta.time,
                    fill.direction,
                    fill.amount,
                    fill.total,
                    fill.fee,
                    fill.slippage_cost,
                    tick.candle.close,
                );
                self.statistics.add_fill_event_for_time(&fill)?;
                debug!(%key, amount = fill.amount, price = fill.purchase_price, "order filled");
            }
            None => {
                // No matching tick yet: the order stays pending with its reservation held
                self.pending_orders
                    .entry(key.clone())
                    .or_default()
                    .push(pending);
            }
        }
        Ok(())
    }

    fn process_signal(&mut self, signal: Signal, tick: &DataTick) -> Result<(), EngineError> {
        self.statistics.add_signal_event_for_time(&signal)?;

        let evaluation = self.portfolio.evaluate(&signal, tick, &self.funding);
        let order = match evaluation {
            Evaluation::Order(order) => order,
            Evaluation::NoAction { meta, direction } => {
                debug!(
                    key = %meta.key,
                    ?direction,
                    reason = meta.reason.as_deref().unwrap_or(""),
                    "signal produced no order"
                );
                return Ok(());
            }
        };

        let holding = self.portfolio.holding(&order.meta.key);
        let order = match self.risk.evaluate(order, holding, &self.compliance) {
            RiskDecision::Pass(order) | RiskDecision::Reduced(order) => order,
            RiskDecision::Veto { order, reason } => {
                debug!(key = %order.meta.key, %reason, "risk vetoed order");
                return Ok(());
            }
        };

        // Reserve quote funds for buys while the order is in flight
        let reservation = match order.direction {
            Direction::Buy => {
                let key = &order.meta.key;
                let quote_pool =
                    self.funding
                        .pool_id(key.venue, key.asset, &key.pair, &key.pair.quote);
                if self.funding.pool(&quote_pool).is_some() {
                    // Hold worst-case cost so the fill can never overdraw the pool
                    let buffer = self
                        .portfolio
                        .settings(key)
                        .map(crate::portfolio::cost_buffer)
                        .unwrap_or(1.0);
                    let required = order.price * order.amount * buffer;
                    match self.funding.reserve(&quote_pool, required) {
                        Ok(reservation) => Some(reservation),
                        Err(error) => {
                            debug!(key = %key, %error, "order dropped: could not reserve funds");
                            return Ok(());
                        }
                    }
                } else {
                    None
                }
            }
            _ => None,
        };

        self.compliance.record(&order);
        self.statistics.add_order_event_for_time(&order)?;
        if let Some(snapshot) = self.compliance.latest(&order.meta.key).cloned() {
            self.statistics.add_compliance_snapshot_for_time(
                &order.meta.key,
                order.meta.time,
                &snapshot,
            )?;
        }

        self.pending_orders
            .entry(order.meta.key.clone())
            .or_default()
            .push(PendingOrder { order, reservation });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{
            BacktestConfig, CurrencySettings, DataSettings, DataSource, DataType, FundingSettings,
            MinMax, PortfolioSettings, StatisticSettings, StrategySettings,
        },
        data::{TickSeries, test_util::{market_key, tick}},
        error::DataFeedError,
        event::DataTick,
        strategy::SmaCross,
    };
    use harbor_exchange::kline::Interval;
    use harbor_instrument::{asset::AssetClass, exchange::VenueId, symbol::Symbol};
    use std::collections::HashMap;

    #[derive(Debug)]
    struct StubFeed {
        series: TickSeries,
        ticks: Vec<DataTick>,
    }

    impl StubFeed {
        fn new(ticks: Vec<DataTick>) -> Self {
            Self {
                series: TickSeries::new(market_key(), Interval::OneHour),
                ticks,
            }
        }
    }

    impl DataHandler for StubFeed {
        fn key(&self) -> &MarketKey {
            self.series.key()
        }

        fn interval(&self) -> Interval {
            self.series.interval()
        }

        fn load(&mut self) -> Result<(), DataFeedError> {
            self.series.set_ticks(self.ticks.clone())
        }

        fn next(&mut self) -> Option<DataTick> {
            self.series.next()
        }

        fn reset(&mut self) {
            self.series.reset()
        }

        fn history(&self) -> &[DataTick] {
            self.series.history()
        }

        fn latest(&self) -> Option<&DataTick> {
            self.series.latest()
        }

        fn offset(&self) -> usize {
            self.series.offset()
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            nickname: "engine-test".to_string(),
            goal: String::new(),
            strategy_settings: StrategySettings {
                name: SmaCross::NAME.to_string(),
                simultaneous_signal_processing: false,
                custom_settings: HashMap::new(),
            },
            currency_settings: vec![CurrencySettings {
                venue: VenueId::BinanceSpot,
                asset: AssetClass::Spot,
                base: Symbol::new("btc"),
                quote: Symbol::new("usdt"),
                initial_base_funds: 0.0,
                initial_quote_funds: 10000.0,
                buy_side: MinMax::default(),
                sell_side: MinMax::default(),
                maker_fee: 0.001,
                taker_fee: 0.002,
                min_slippage_percent: 0.0,
                max_slippage_percent: 0.001,
                use_exchange_order_limits: false,
                skip_candle_volume_fit_check: false,
            }],
            funding_settings: FundingSettings::default(),
            data_settings: DataSettings {
                interval: Interval::OneHour,
                data_type: DataType::Candle,
                inclusive_end_date: false,
                source: DataSource::Csv {
                    path: "unused.csv".into(),
                },
            },
            portfolio_settings: PortfolioSettings::default(),
            statistic_settings: StatisticSettings {
                risk_free_rate: 0.0,
                slippage_seed: 7,
            },
        }
    }

    fn trending_ticks() -> Vec<DataTick> {
        // Rising then falling closes so the SMA cross emits both buys and sells
        let closes = [100.0, 101.0, 103.0, 106.0, 110.0, 108.0, 101.0, 95.0, 90.0, 88.0];
        closes
            .iter()
            .enumerate()
            .map(|(hour, close)| tick(hour as u32, *close))
            .collect()
    }

    fn run_engine() -> Engine {
        let feed = StubFeed::new(trending_ticks());
        let mut engine = Engine::new(
            config(),
            vec![Box::new(feed)],
            Box::new(SmaCross::new(2, 3)),
        )
        .unwrap();
        engine.run().unwrap();
        engine
    }

    #[test]
    fn test_run_produces_timeline_with_fills() {
        let engine = run_engine();
        let timeline = engine.statistics().timeline(&market_key()).unwrap();

        assert_eq!(timeline.len(), 10);
        // Rising closes produce at least one buy order and fill
        assert!(timeline.iter().any(|entry| entry.order.is_some()));
        assert!(timeline.iter().any(|entry| entry.fill.is_some()));
        // Timeline times are monotonically non-decreasing
        assert!(timeline.windows(2).all(|pair| pair[0].time <= pair[1].time));
    }

    #[test]
    fn test_funds_never_go_negative() {
        let engine = run_engine();
        assert!(engine.funding.total_funds() >= 0.0);

        let timeline = engine.statistics().timeline(&market_key()).unwrap();
        for entry in timeline {
            if let Some(holding) = &entry.holding {
                assert!(
                    holding.remaining_funds >= -1e-9,
                    "remaining funds went negative: {}",
                    holding.remaining_funds
                );
            }
        }
    }

    #[test]
    fn test_identical_runs_are_deterministic() {
        let a = run_engine();
        let b = run_engine();

        let a_snapshot = serde_json::to_string(&a.statistics().snapshot()).unwrap();
        let b_snapshot = serde_json::to_string(&b.statistics().snapshot()).unwrap();
        assert_eq!(a_snapshot, b_snapshot);
    }

    #[test]
    fn test_simultaneous_mode_requires_strategy_support() {
        let mut config = config();
        config.strategy_settings.simultaneous_signal_processing = true;

        let result = Engine::new(
            config,
            vec![Box::new(StubFeed::new(trending_ticks()))],
            Box::new(SmaCross::new(2, 3)),
        );
        assert!(matches!(result, Err(EngineError::SimultaneousUnsupported)));
    }
}
