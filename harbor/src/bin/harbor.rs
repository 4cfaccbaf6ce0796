use clap::{Parser, Subcommand};
use harbor::{
    config::{BacktestConfig, DataSource, DataType},
    data::{
        DataHandler,
        csv::{CsvCandleData, CsvTradeData},
    },
    engine::Engine,
    strategy::load_strategy,
};
use harbor_instrument::{MarketKey, pair::Pair};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

/// Harbor backtester command line interface.
#[derive(Debug, Parser)]
#[command(name = "harbor", version, about = "Harbor event-driven backtester")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a backtest config and run it to completion.
    Run {
        /// Path to the backtest JSON config document.
        config: PathBuf,
    },
    /// Validate a backtest config without running it.
    Check {
        /// Path to the backtest JSON config document.
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config } => run(config),
        Command::Check { config } => check(config).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "harbor exited with a hard error");
            ExitCode::FAILURE
        }
    }
}

fn check(path: PathBuf) -> Result<BacktestConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(&path)
        .map_err(|error| format!("failed to read config {}: {error}", path.display()))?;
    let config: BacktestConfig = serde_json::from_str(&contents)?;

    let strategy = load_strategy(&config.strategy_settings)?;
    config.validate(strategy.requires_exchange_level_funding())?;

    info!(nickname = %config.nickname, "backtest config is valid");
    Ok(config)
}

fn run(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = check(path)?;
    let strategy = load_strategy(&config.strategy_settings)?;

    let feeds = build_feeds(&config)?;
    let mut engine = Engine::new(config, feeds, strategy)?;
    engine.run()?;

    engine.statistics().summary_table().printstd();
    Ok(())
}

fn build_feeds(
    config: &BacktestConfig,
) -> Result<Vec<Box<dyn DataHandler>>, Box<dyn std::error::Error>> {
    let DataSource::Csv { path } = &config.data_settings.source else {
        return Err(
            "only csv data sources are wired into the CLI; api/database/live sources require \
             service deployment"
                .into(),
        );
    };

    let interval = config.data_settings.interval;
    let mut feeds: Vec<Box<dyn DataHandler>> = Vec::new();
    for settings in &config.currency_settings {
        let key = MarketKey::new(
            settings.venue,
            settings.asset,
            Pair::new(settings.base.clone(), settings.quote.clone()),
        );

        // A single market reads the path directly; multiple markets read per-market files
        // under the path directory (eg/ btcusdt.csv)
        let market_path = if config.currency_settings.len() == 1 {
            path.clone()
        } else {
            path.join(format!("{}{}.csv", settings.base, settings.quote))
        };

        match config.data_settings.data_type {
            DataType::Candle => {
                feeds.push(Box::new(CsvCandleData::new(key, interval, market_path)))
            }
            DataType::Trade => feeds.push(Box::new(CsvTradeData::new(key, interval, market_path))),
        }
    }
    Ok(feeds)
}
