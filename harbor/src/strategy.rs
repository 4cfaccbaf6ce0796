use crate::{
    config::StrategySettings,
    error::{ConfigError, EngineError},
    event::{DataTick, Direction, OrderType, Signal},
    funding::FundManager,
    portfolio::Portfolio,
};
use fnv::FnvHashMap;
use harbor_instrument::MarketKey;

/// User strategy behind a polymorphic interface.
///
/// Non-simultaneous strategies receive each market's tick independently via
/// [`on_signal`](Self::on_signal). Strategies that declare
/// [`supports_simultaneous_processing`](Self::supports_simultaneous_processing) receive all
/// markets' ticks of one timestamp together via
/// [`on_simultaneous_signals`](Self::on_simultaneous_signals), enabling cross-pair decisions.
pub trait Strategy: std::fmt::Debug + Send {
    fn name(&self) -> &'static str;

    fn supports_simultaneous_processing(&self) -> bool {
        false
    }

    /// Declared by strategies that draw from shared exchange-level funding pools; checked
    /// against [`FundingSettings`](crate::config::FundingSettings) at load.
    fn requires_exchange_level_funding(&self) -> bool {
        false
    }

    /// Produce an advisory [`Signal`] for one market's tick.
    fn on_signal(
        &mut self,
        tick: &DataTick,
        portfolio: &Portfolio,
        funding: &FundManager,
    ) -> Result<Signal, EngineError>;

    /// Produce advisory [`Signal`]s across all markets' ticks of one timestamp.
    fn on_simultaneous_signals(
        &mut self,
        ticks: &[DataTick],
        portfolio: &Portfolio,
        funding: &FundManager,
    ) -> Result<Vec<Signal>, EngineError> {
        let _ = (ticks, portfolio, funding);
        Err(EngineError::SimultaneousUnsupported)
    }
}

/// Load the configured strategy by name.
pub fn load_strategy(settings: &StrategySettings) -> Result<Box<dyn Strategy>, ConfigError> {
    match settings.name.as_str() {
        SmaCross::NAME => {
            let fast = settings
                .custom_settings
                .get("fast_period")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(5) as usize;
            let slow = settings
                .custom_settings
                .get("slow_period")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(20) as usize;
            Ok(Box::new(SmaCross::new(fast, slow)))
        }
        unknown => Err(ConfigError::UnknownStrategy(unknown.to_string())),
    }
}

/// Reference strategy: fast/slow simple moving average crossover per market.
#[derive(Debug)]
pub struct SmaCross {
    fast_period: usize,
    slow_period: usize,
    closes: FnvHashMap<MarketKey, Vec<f64>>,
}

impl SmaCross {
    pub const NAME: &'static str = "sma-cross";

    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period: fast_period.max(1),
            slow_period: slow_period.max(2),
            closes: FnvHashMap::default(),
        }
    }

    fn sma(closes: &[f64], period: usize) -> Option<f64> {
        if closes.len() < period {
            return None;
        }
        Some(closes[closes.len() - period..].iter().sum::<f64>() / period as f64)
    }
}

impl Strategy for SmaCross {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_signal(
        &mut self,
        tick: &DataTick,
        _portfolio: &Portfolio,
        _funding: &FundManager,
    ) -> Result<Signal, EngineError> {
        let closes = self.closes.entry(tick.meta.key.clone()).or_default();
        closes.push(tick.candle.close);

        let direction = match (
            Self::sma(closes, self.fast_period),
            Self::sma(closes, self.slow_period),
        ) {
            (Some(fast), Some(slow)) if fast > slow => Direction::Buy,
            (Some(fast), Some(slow)) if fast < slow => Direction::Sell,
            (Some(_), Some(_)) => Direction::DoNothing,
            // Not enough lookback yet
            _ => Direction::MissingData,
        };

        Ok(Signal {
            meta: tick.meta.clone(),
            direction,
            price: tick.candle.close,
            order_type: OrderType::Market,
        })
    }
}
