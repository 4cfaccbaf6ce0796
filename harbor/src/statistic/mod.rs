use crate::{
    compliance::ComplianceSnapshot,
    error::StatisticError,
    event::{DataTick, FillEvent, OrderEvent, Signal},
    portfolio::Holding,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use harbor_instrument::MarketKey;
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Performance metrics computed over timelines.
pub mod metric;

/// One timeline entry: a data tick plus references to anything emitted at that time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TimelineEntry {
    pub time: DateTime<Utc>,
    pub data: DataTick,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holding: Option<Holding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceSnapshot>,
}

/// Per market timelines with one entry per data tick.
///
/// Setters attach events to the entry whose time matches; a missing timeline or a time with no
/// data entry is framework misuse and halts the engine.
#[derive(Debug, Default)]
pub struct StatisticRegistry {
    timelines: FnvHashMap<MarketKey, Vec<TimelineEntry>>,
    risk_free_rate: f64,
}

impl StatisticRegistry {
    /// Construct a new [`StatisticRegistry`] with a timeline per provided market.
    pub fn new(keys: impl IntoIterator<Item = MarketKey>, risk_free_rate: f64) -> Self {
        Self {
            timelines: keys.into_iter().map(|key| (key, Vec::new())).collect(),
            risk_free_rate,
        }
    }

    fn timeline_mut(&mut self, key: &MarketKey) -> Result<&mut Vec<TimelineEntry>, StatisticError> {
        self.timelines
            .get_mut(key)
            .ok_or_else(|| StatisticError::RegistryUninitialised(key.to_string()))
    }

    fn entry_at(
        &mut self,
        key: &MarketKey,
        time: DateTime<Utc>,
    ) -> Result<&mut TimelineEntry, StatisticError> {
        self.timeline_mut(key)?
            .iter_mut()
            .rev()
            .find(|entry| entry.time == time)
            .ok_or(StatisticError::NoDataAtTime(time))
    }

    /// Append a new timeline entry for the provided [`DataTick`].
    pub fn add_data_event_for_time(&mut self, tick: &DataTick) -> Result<(), StatisticError> {
        let entry = TimelineEntry {
            time: tick.meta.time,
            data: tick.clone(),
            signal: None,
            order: None,
            fill: None,
            holding: None,
            compliance: None,
        };
        self.timeline_mut(&tick.meta.key)?.push(entry);
        Ok(())
    }

    /// Attach a [`Signal`] to the data entry sharing its time.
    pub fn add_signal_event_for_time(&mut self, signal: &Signal) -> Result<(), StatisticError> {
        self.entry_at(&signal.meta.key, signal.meta.time)?.signal = Some(signal.clone());
        Ok(())
    }

    /// Attach an [`OrderEvent`] to the data entry sharing its time.
    pub fn add_order_event_for_time(&mut self, order: &OrderEvent) -> Result<(), StatisticError> {
        self.entry_at(&order.meta.key, order.meta.time)?.order = Some(order.clone());
        Ok(())
    }

    /// Attach a [`FillEvent`] to the data entry sharing its time.
    pub fn add_fill_event_for_time(&mut self, fill: &FillEvent) -> Result<(), StatisticError> {
        self.entry_at(&fill.meta.key, fill.meta.time)?.fill = Some(fill.clone());
        Ok(())
    }

    /// Attach a [`Holding`] snapshot to the data entry at the provided time.
    pub fn add_holdings_for_time(
        &mut self,
        key: &MarketKey,
        time: DateTime<Utc>,
        holding: &Holding,
    ) -> Result<(), StatisticError> {
        self.entry_at(key, time)?.holding = Some(holding.clone());
        Ok(())
    }

    /// Attach a [`ComplianceSnapshot`] to the data entry at the provided time.
    pub fn add_compliance_snapshot_for_time(
        &mut self,
        key: &MarketKey,
        time: DateTime<Utc>,
        snapshot: &ComplianceSnapshot,
    ) -> Result<(), StatisticError> {
        self.entry_at(key, time)?.compliance = Some(snapshot.clone());
        Ok(())
    }

    /// The timeline of one market.
    pub fn timeline(&self, key: &MarketKey) -> Option<&[TimelineEntry]> {
        self.timelines.get(key).map(Vec::as_slice)
    }

    /// Serializable snapshot of every timeline, for reporting.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            timelines: self
                .timelines
                .iter()
                .map(|(key, timeline)| (key.to_string(), timeline.clone()))
                .collect(),
        }
    }

    /// Compute the per market [`MarketSummary`]s.
    pub fn summaries(&self) -> Vec<MarketSummary> {
        let mut summaries = self
            .timelines
            .iter()
            .map(|(key, timeline)| summarise(key, timeline, self.risk_free_rate))
            .collect::<Vec<_>>();
        summaries.sort_by(|a, b| a.market.cmp(&b.market));
        summaries
    }

    /// Render every [`MarketSummary`] as a display table.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row![
            "Market",
            "Ticks",
            "Fills",
            "PnL",
            "Fees",
            "Sharpe",
            "Sortino",
            "MaxDrawdown",
            "WinRate"
        ]);

        for summary in self.summaries() {
            table.add_row(row![
                summary.market,
                summary.ticks,
                summary.fills,
                format!("{:.4}", summary.pnl),
                format!("{:.4}", summary.fees_paid),
                format_option(summary.sharpe),
                format_option(summary.sortino),
                format!("{:.4}", summary.max_drawdown),
                format_option(summary.win_rate),
            ]);
        }
        table
    }
}

fn format_option(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.4}"),
        None => "-".to_string(),
    }
}

/// Serializable snapshot of all timelines.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatisticsSnapshot {
    pub timelines: BTreeMap<String, Vec<TimelineEntry>>,
}

/// Summary metrics for one market.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketSummary {
    pub market: String,
    pub ticks: usize,
    pub fills: usize,
    pub pnl: f64,
    pub fees_paid: f64,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub max_drawdown: f64,
    pub win_rate: Option<f64>,
}

fn summarise(key: &MarketKey, timeline: &[TimelineEntry], risk_free_rate: f64) -> MarketSummary {
    let equity = timeline
        .iter()
        .filter_map(|entry| entry.holding.as_ref().map(|holding| holding.total_value))
        .collect::<Vec<_>>();

    let returns = equity
        .windows(2)
        .filter(|window| window[0] != 0.0)
        .map(|window| (window[1] - window[0]) / window[0])
        .collect::<Vec<_>>();

    let fill_outcomes = timeline
        .iter()
        .filter_map(|entry| entry.holding.as_ref().map(|holding| holding.realized_pnl))
        .collect::<Vec<_>>();
    let realized_deltas = fill_outcomes
        .windows(2)
        .map(|window| window[1] - window[0])
        .filter(|delta| *delta != 0.0)
        .collect::<Vec<_>>();

    let last_holding = timeline
        .iter()
        .rev()
        .find_map(|entry| entry.holding.as_ref());

    MarketSummary {
        market: key.to_string(),
        ticks: timeline.len(),
        fills: timeline.iter().filter(|entry| entry.fill.is_some()).count(),
        pnl: last_holding
            .map(|holding| holding.total_value - holding.initial_funds)
            .unwrap_or(0.0),
        fees_paid: last_holding.map(|holding| holding.fees_paid).unwrap_or(0.0),
        sharpe: metric::sharpe_ratio(&returns, risk_free_rate),
        sortino: metric::sortino_ratio(&returns, risk_free_rate),
        max_drawdown: metric::max_drawdown(&equity),
        win_rate: metric::win_rate(&realized_deltas),
    }
}
