use crate::{error::DataFeedError, event::DataTick};
use chrono::{DateTime, Utc};
use harbor_exchange::kline::{Interval, RangeHolder};
use harbor_instrument::MarketKey;

/// Venue API candle feed behind an injected kline source port.
pub mod api;

/// CSV candle and trade feeds.
pub mod csv;

/// Database candle feed behind an injected repository port.
pub mod database;

/// Live feed bridged from `harbor-data` streams.
pub mod live;

/// Trade tape utilities, including trade-to-candle conversion.
pub mod trades;

/// A restartable ordered stream of [`DataTick`]s for one market.
///
/// `next` is non-blocking and returns `None` on exhaustion; `reset` rewinds to the start;
/// `history`/`latest`/`offset` give strategies positional lookback views.
pub trait DataHandler: std::fmt::Debug + Send {
    /// The market this feed serves.
    fn key(&self) -> &MarketKey;

    /// The candle interval of this feed.
    fn interval(&self) -> Interval;

    /// Load and validate the underlying data. Fails loudly on schema defects or range gaps.
    fn load(&mut self) -> Result<(), DataFeedError>;

    /// The next [`DataTick`], or `None` once the feed is exhausted.
    fn next(&mut self) -> Option<DataTick>;

    /// Rewind the feed to its start.
    fn reset(&mut self);

    /// Every tick served so far, oldest first.
    fn history(&self) -> &[DataTick];

    /// The most recently served tick.
    fn latest(&self) -> Option<&DataTick>;

    /// Number of ticks served so far.
    fn offset(&self) -> usize;
}

/// Shared ordered tick storage backing every [`DataHandler`] implementation.
#[derive(Debug, Clone)]
pub struct TickSeries {
    key: MarketKey,
    interval: Interval,
    ticks: Vec<DataTick>,
    offset: usize,
}

impl TickSeries {
    pub fn new(key: MarketKey, interval: Interval) -> Self {
        Self {
            key,
            interval,
            ticks: Vec::new(),
            offset: 0,
        }
    }

    pub fn key(&self) -> &MarketKey {
        &self.key
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Replace the stored ticks, sorting by time and resetting the cursor.
    pub fn set_ticks(&mut self, mut ticks: Vec<DataTick>) -> Result<(), DataFeedError> {
        if ticks.is_empty() {
            return Err(DataFeedError::Empty);
        }
        ticks.sort_by_key(|tick| tick.meta.time);
        self.ticks = ticks;
        self.offset = 0;
        Ok(())
    }

    /// Verify the stored ticks cover `[start, end)` without gaps.
    ///
    /// An uncovered tail is tolerated when `inclusive_end_date` extends past the configured end,
    /// since the final interval may legitimately still be forming.
    pub fn verify_coverage(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        inclusive_end_date: bool,
    ) -> Result<(), DataFeedError> {
        let mut holder = RangeHolder::new(start, end, self.interval, 1);
        for tick in &self.ticks {
            holder.mark_covered(tick.meta.time);
        }

        let expected = holder.intervals_expected;
        let present = holder.intervals_present();
        let tolerated_tail = u64::from(inclusive_end_date);
        if present + tolerated_tail < expected {
            return Err(DataFeedError::Gap { expected, present });
        }
        Ok(())
    }

    pub fn next(&mut self) -> Option<DataTick> {
        let tick = self.ticks.get(self.offset).cloned()?;
        self.offset += 1;
        Some(tick)
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    pub fn history(&self) -> &[DataTick] {
        &self.ticks[..self.offset]
    }

    pub fn latest(&self) -> Option<&DataTick> {
        self.offset.checked_sub(1).and_then(|index| self.ticks.get(index))
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::event::EventMeta;
    use chrono::TimeZone;
    use harbor_data::subscription::candle::Candle;
    use harbor_instrument::{asset::AssetClass, exchange::VenueId, pair::Pair};

    pub fn market_key() -> MarketKey {
        MarketKey::new(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            Pair::new("btc", "usdt"),
        )
    }

    pub fn tick(hour: u32, close: f64) -> DataTick {
        DataTick {
            meta: EventMeta::new(
                market_key(),
                Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap(),
                Interval::OneHour,
            ),
            candle: Candle {
                close_time: Utc.with_ymd_and_hms(2020, 1, 1, hour, 59, 59).unwrap(),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 100.0,
                trade_count: 10,
            },
            trades: vec![],
        }
    }
}
