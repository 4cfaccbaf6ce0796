use chrono::{DateTime, Utc};
use harbor_instrument::MarketKey;
use thiserror::Error;

/// All errors generated in the Harbor backtester.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("backtest config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data feed error: {0}")]
    Data(#[from] DataFeedError),

    #[error("funding error: {0}")]
    Funding(#[from] FundingError),

    #[error("statistic error: {0}")]
    Statistic(#[from] StatisticError),

    #[error("strategy does not support simultaneous signal processing")]
    SimultaneousUnsupported,

    #[error("event time {time} regressed behind the market timeline for {key}")]
    TimeRegression { key: MarketKey, time: DateTime<Utc> },

    #[error("venue error: {0}")]
    Venue(#[from] harbor_exchange::error::VenueError),
}

/// Backtest configuration validation errors. Fatal at load.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("no currency settings configured")]
    CurrencySettingsEmpty,

    #[error("invalid date range: start {start} must be before end {end}")]
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("api and database data sources require both start and end dates")]
    DatesRequired,

    #[error("bad slippage rates: requires 0 <= min < max")]
    BadSlippageRates,

    #[error("bad initial funds for {pair}: {reason}")]
    BadInitialFunds { pair: String, reason: String },

    #[error("exchange level funding requires simultaneous signal processing")]
    SimultaneousProcessingRequired,

    #[error("strategy requires exchange level funding but none is configured")]
    ExchangeLevelFundingRequired,

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Data feed errors.
#[derive(Debug, Error)]
pub enum DataFeedError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data feed holds no events after load")]
    Empty,

    #[error("data gap: expected {expected} intervals but only {present} are present")]
    Gap { expected: u64, present: u64 },

    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Funding pool errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FundingError {
    #[error("no funding pool registered for {0}")]
    PoolNotFound(String),

    #[error("insufficient funds in pool {pool}: requested {requested}, available {available}")]
    InsufficientFunds {
        pool: String,
        requested: f64,
        available: f64,
    },
}

/// Statistics registry errors. These halt the engine: they indicate framework misuse, not a
/// business outcome.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StatisticError {
    #[error("statistics timeline not initialised for {0}")]
    RegistryUninitialised(String),

    #[error("no data event at time {0} to attach to")]
    NoDataAtTime(DateTime<Utc>),
}
