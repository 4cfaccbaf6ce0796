#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments, type_alias_bounds)]

//! # Harbor
//! Event-driven backtesting engine sharing the Harbor live-trading data and execution model.
//!
//! The engine is a single-threaded discrete-event loop: data ticks flow through strategy,
//! portfolio, risk and sizing stages, orders fill against a simulated exchange with bounded
//! slippage and maker/taker fees, and fills feed funding pools, holdings, compliance history and
//! statistics timelines. Given identical inputs (data, config, strategy, slippage seed) two
//! runs produce identical statistics output.
//!
//! ## Components
//! * **Data**: restartable ordered feeds ([`data`]) from venue APIs, CSV files, a database port,
//!   or live `harbor-data` streams.
//! * **Strategy**: user code behind the polymorphic [`Strategy`](strategy::Strategy) trait, in
//!   per-pair or simultaneous (cross-pair) signal mode.
//! * **Portfolio**: funds/position gating and order sizing ([`portfolio`]).
//! * **Risk**: order reduction or veto before the exchange ([`risk`]).
//! * **Exchange**: simulated fills ([`exchange`]).
//! * **Funding**: per-pair or exchange-level pools with reservations ([`funding`]).
//! * **Statistic**: per-market timelines and a trading summary ([`statistic`]).

/// Compliance history of submitted orders per market.
pub mod compliance;

/// Backtest configuration document and validation.
pub mod config;

/// Restartable ordered data feeds.
pub mod data;

/// Simulated exchange fill model.
pub mod exchange;

/// The single-threaded discrete-event engine.
pub mod engine;

/// All [`Error`](std::error::Error)s generated in the Harbor backtester.
pub mod error;

/// Backtest event union and direction model.
pub mod event;

/// Funding pools with reservations.
pub mod funding;

/// Holdings snapshots and the portfolio gating/sizing stage.
pub mod portfolio;

/// Deterministic event priority queue.
pub mod queue;

/// Risk evaluation stage.
pub mod risk;

/// Statistics timelines and trading summary.
pub mod statistic;

/// [`Strategy`](strategy::Strategy) trait and a reference implementation.
pub mod strategy;
