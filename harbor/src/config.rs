use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use harbor_exchange::kline::Interval;
use harbor_instrument::{asset::AssetClass, exchange::VenueId, symbol::Symbol};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf};

/// Complete backtest configuration document.
///
/// Round-trippable through serde: serialising then deserialising yields an equivalent config.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestConfig {
    pub nickname: String,
    #[serde(default)]
    pub goal: String,
    pub strategy_settings: StrategySettings,
    pub currency_settings: Vec<CurrencySettings>,
    #[serde(default)]
    pub funding_settings: FundingSettings,
    pub data_settings: DataSettings,
    #[serde(default)]
    pub portfolio_settings: PortfolioSettings,
    #[serde(default)]
    pub statistic_settings: StatisticSettings,
}

/// Which strategy to run and how it processes signals.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategySettings {
    pub name: String,
    /// Present all pairs' data of the same timestamp to the strategy together, enabling
    /// cross-pair decisions. The legacy `is_multi_currency` name is migrated on load.
    #[serde(default, alias = "is_multi_currency")]
    pub simultaneous_signal_processing: bool,
    #[serde(default)]
    pub custom_settings: HashMap<String, serde_json::Value>,
}

/// Per market settings: initial funds, order size bounds, fees and slippage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CurrencySettings {
    pub venue: VenueId,
    pub asset: AssetClass,
    pub base: Symbol,
    pub quote: Symbol,
    #[serde(default)]
    pub initial_base_funds: f64,
    #[serde(default)]
    pub initial_quote_funds: f64,
    #[serde(default)]
    pub buy_side: MinMax,
    #[serde(default)]
    pub sell_side: MinMax,
    #[serde(default)]
    pub maker_fee: f64,
    #[serde(default)]
    pub taker_fee: f64,
    pub min_slippage_percent: f64,
    pub max_slippage_percent: f64,
    #[serde(default)]
    pub use_exchange_order_limits: bool,
    #[serde(default)]
    pub skip_candle_volume_fit_check: bool,
}

/// Minimum, maximum and total size bounds for one order side.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MinMax {
    #[serde(default)]
    pub minimum_size: f64,
    #[serde(default)]
    pub maximum_size: f64,
    #[serde(default)]
    pub maximum_total: f64,
}

/// Exchange-level funding pools shared across pairs.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct FundingSettings {
    #[serde(default)]
    pub use_exchange_level_funding: bool,
    #[serde(default)]
    pub exchange_level_funding: Vec<ExchangeLevelFunding>,
}

/// One exchange-level funding pool.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExchangeLevelFunding {
    pub venue: VenueId,
    pub asset: AssetClass,
    pub currency: Symbol,
    pub initial_funds: f64,
}

/// What data drives the backtest and where it comes from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DataSettings {
    pub interval: Interval,
    pub data_type: DataType,
    /// Extends the configured end date by one interval so the final candle is included.
    #[serde(default)]
    pub inclusive_end_date: bool,
    pub source: DataSource,
}

/// Whether the feed yields candles or a raw trade tape.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Candle,
    Trade,
}

/// The concrete data source backing the feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Api {
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
    Csv {
        path: PathBuf,
    },
    Database {
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
    Live {
        real_orders: bool,
    },
}

/// Global portfolio constraints applied on top of per market settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PortfolioSettings {
    #[serde(default)]
    pub buy_side: MinMax,
    #[serde(default)]
    pub sell_side: MinMax,
    #[serde(default = "default_leverage")]
    pub leverage: f64,
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            buy_side: MinMax::default(),
            sell_side: MinMax::default(),
            leverage: default_leverage(),
        }
    }
}

fn default_leverage() -> f64 {
    1.0
}

/// Statistics configuration.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct StatisticSettings {
    #[serde(default)]
    pub risk_free_rate: f64,
    /// Seed for the slippage model; identical seeds make runs reproducible.
    #[serde(default)]
    pub slippage_seed: u64,
}

impl BacktestConfig {
    /// Validate the whole document, surfacing the first defect found.
    ///
    /// `strategy_requires_exchange_level_funding` is reported by the loaded strategy and
    /// cross-checked against [`FundingSettings`].
    pub fn validate(
        &self,
        strategy_requires_exchange_level_funding: bool,
    ) -> Result<(), ConfigError> {
        if self.currency_settings.is_empty() {
            return Err(ConfigError::CurrencySettingsEmpty);
        }

        self.validate_dates()?;
        for settings in &self.currency_settings {
            validate_slippage(settings)?;
            self.validate_funds(settings)?;
        }

        if self.funding_settings.use_exchange_level_funding
            && !self.strategy_settings.simultaneous_signal_processing
        {
            return Err(ConfigError::SimultaneousProcessingRequired);
        }

        if strategy_requires_exchange_level_funding
            && !self.funding_settings.use_exchange_level_funding
        {
            return Err(ConfigError::ExchangeLevelFundingRequired);
        }

        Ok(())
    }

    fn validate_dates(&self) -> Result<(), ConfigError> {
        match &self.data_settings.source {
            DataSource::Api {
                start_date,
                end_date,
            }
            | DataSource::Database {
                start_date,
                end_date,
            } => {
                if start_date >= end_date {
                    return Err(ConfigError::DateRange {
                        start: *start_date,
                        end: *end_date,
                    });
                }
                Ok(())
            }
            DataSource::Csv { .. } | DataSource::Live { .. } => Ok(()),
        }
    }

    fn validate_funds(&self, settings: &CurrencySettings) -> Result<(), ConfigError> {
        let pair = format!("{}-{}", settings.base, settings.quote);
        let has_pair_funds =
            settings.initial_base_funds > 0.0 || settings.initial_quote_funds > 0.0;

        if self.funding_settings.use_exchange_level_funding {
            // Exchange-level mode shares pools across pairs, so per-pair funds must be zero
            if has_pair_funds {
                return Err(ConfigError::BadInitialFunds {
                    pair,
                    reason: "per-pair funds must be zero under exchange level funding"
                        .to_string(),
                });
            }
            if self
                .funding_settings
                .exchange_level_funding
                .iter()
                .any(|pool| pool.initial_funds < 0.0)
            {
                return Err(ConfigError::BadInitialFunds {
                    pair,
                    reason: "exchange level pool funds must be >= 0".to_string(),
                });
            }
        } else if !has_pair_funds {
            return Err(ConfigError::BadInitialFunds {
                pair,
                reason: "at least one of initial base or quote funds must be > 0".to_string(),
            });
        }

        Ok(())
    }

    /// The effective end date: `inclusive_end_date` extends the configured end by one interval.
    pub fn effective_end_date(&self) -> Option<DateTime<Utc>> {
        let end = match &self.data_settings.source {
            DataSource::Api { end_date, .. } | DataSource::Database { end_date, .. } => *end_date,
            _ => return None,
        };
        Some(if self.data_settings.inclusive_end_date {
            end + self.data_settings.interval.duration()
        } else {
            end
        })
    }
}

fn validate_slippage(settings: &CurrencySettings) -> Result<(), ConfigError> {
    let (min, max) = (settings.min_slippage_percent, settings.max_slippage_percent);
    if min < 0.0 || max < 0.0 || min >= max {
        return Err(ConfigError::BadSlippageRates);
    }
    Ok(())
}
