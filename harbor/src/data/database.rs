use super::{DataHandler, TickSeries};
use crate::{
    error::DataFeedError,
    event::{DataTick, EventMeta},
};
use chrono::{DateTime, Utc};
use harbor_data::subscription::candle::Candle;
use harbor_exchange::kline::Interval;
use harbor_instrument::MarketKey;

/// Injected persistence port serving stored candle series.
///
/// The core treats persistence as a port: live deployments back this with the SQL candle
/// tables, tests with in-memory fixtures.
pub trait CandleRepository: std::fmt::Debug + Send {
    fn series(
        &self,
        key: &MarketKey,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, Candle)>, DataFeedError>;
}

/// Database candle feed behind a [`CandleRepository`] port.
#[derive(Debug)]
pub struct DatabaseCandleData<Repository> {
    repository: Repository,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    inclusive_end_date: bool,
    series: TickSeries,
}

impl<Repository> DatabaseCandleData<Repository>
where
    Repository: CandleRepository,
{
    pub fn new(
        key: MarketKey,
        interval: Interval,
        repository: Repository,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        inclusive_end_date: bool,
    ) -> Self {
        Self {
            repository,
            start,
            end,
            inclusive_end_date,
            series: TickSeries::new(key, interval),
        }
    }
}

impl<Repository> DataHandler for DatabaseCandleData<Repository>
where
    Repository: CandleRepository,
{
    fn key(&self) -> &MarketKey {
        self.series.key()
    }

    fn interval(&self) -> Interval {
        self.series.interval()
    }

    fn load(&mut self) -> Result<(), DataFeedError> {
        let key = self.series.key().clone();
        let interval = self.series.interval();

        let candles =
            self.repository
                .series(&key, interval, self.start, self.end)?;

        let ticks = candles
            .into_iter()
            .map(|(time, candle)| DataTick {
                meta: EventMeta::new(key.clone(), time, interval),
                candle,
                trades: vec![],
            })
            .collect();

        self.series.set_ticks(ticks)?;
        self.series
            .verify_coverage(self.start, self.end, self.inclusive_end_date)
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
