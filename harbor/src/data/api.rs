use super::{DataHandler, TickSeries};
use crate::{
    error::DataFeedError,
    event::{DataTick, EventMeta},
};
use chrono::{DateTime, Utc};
use harbor_data::subscription::candle::Candle;
use harbor_exchange::kline::{ExtendedKlineRequest, Interval, TimeRange};
use harbor_instrument::MarketKey;
use tracing::debug;

/// Port for fetching one batch of venue klines.
///
/// Implemented over the venue REST clients in live deployments, and by stubs in tests so feed
/// loading stays deterministic.
pub trait KlineSource: std::fmt::Debug + Send {
    fn candles(
        &mut self,
        range: TimeRange,
    ) -> Result<Vec<(DateTime<Utc>, Candle)>, DataFeedError>;
}

/// Venue API candle feed.
///
/// Loading walks the [`ExtendedKlineRequest`] range holder batch by batch, recording coverage,
/// and fails loudly on gaps unless `inclusive_end_date` covers the still-forming tail interval.
#[derive(Debug)]
pub struct ApiCandleData<Source> {
    request: ExtendedKlineRequest,
    source: Source,
    inclusive_end_date: bool,
    series: TickSeries,
}

impl<Source> ApiCandleData<Source>
where
    Source: KlineSource,
{
    pub fn new(
        key: MarketKey,
        request: ExtendedKlineRequest,
        source: Source,
        inclusive_end_date: bool,
    ) -> Self {
        let interval = request.interval;
        Self {
            request,
            source,
            inclusive_end_date,
            series: TickSeries::new(key, interval),
        }
    }
}

impl<Source> DataHandler for ApiCandleData<Source>
where
    Source: KlineSource,
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

        let batches = self.request.ranges.batches().to_vec();
        let mut ticks = Vec::new();
        for range in batches {
            let candles = self.source.candles(range)?;
            debug!(?range, count = candles.len(), "fetched kline batch");
            for (time, candle) in candles {
                self.request.ranges.mark_covered(time);
                ticks.push(DataTick {
                    meta: EventMeta::new(key.clone(), time, interval),
                    candle,
                    trades: vec![],
                });
            }
        }

        self.series.set_ticks(ticks)?;
        self.series.verify_coverage(
            self.request.ranges.start,
            self.request.ranges.end,
            self.inclusive_end_date,
        )
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use harbor_instrument::{asset::AssetClass, exchange::VenueId, pair::Pair};
    use smol_str::SmolStr;

    fn key() -> MarketKey {
        MarketKey::new(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            Pair::new("btc", "usdt"),
        )
    }

    #[derive(Debug)]
    struct StubSource {
        skip_hours: Vec<u32>,
    }

    impl KlineSource for StubSource {
        fn candles(
            &mut self,
            range: TimeRange,
        ) -> Result<Vec<(DateTime<Utc>, Candle)>, DataFeedError> {
            let mut cursor = range.start;
            let mut out = Vec::new();
            while cursor < range.end {
                let hour = chrono::Timelike::hour(&cursor);
                if !self.skip_hours.contains(&hour) {
                    out.push((cursor, Candle::default()));
                }
                cursor += chrono::TimeDelta::hours(1);
            }
            Ok(out)
        }
    }

    fn request(hours: u32) -> ExtendedKlineRequest {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        ExtendedKlineRequest::new(
            Pair::new("btc", "usdt"),
            AssetClass::Spot,
            SmolStr::from("BTCUSDT"),
            Interval::OneHour,
            start,
            start + chrono::TimeDelta::hours(hours as i64),
            &[Interval::OneHour],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_load_batches_and_covers_range() {
        let mut feed = ApiCandleData::new(
            key(),
            request(5),
            StubSource { skip_hours: vec![] },
            false,
        );

        feed.load().unwrap();
        let mut count = 0;
        while feed.next().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_load_fails_loudly_on_gap() {
        let mut feed = ApiCandleData::new(
            key(),
            request(5),
            StubSource {
                skip_hours: vec![2],
            },
            false,
        );

        assert!(matches!(feed.load(), Err(DataFeedError::Gap { .. })));
    }
}
