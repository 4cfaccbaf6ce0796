use super::{DataHandler, TickSeries};
use crate::{
    data::trades::convert_to_candles,
    error::DataFeedError,
    event::{DataTick, EventMeta},
};
use chrono::{DateTime, Utc};
use harbor_data::subscription::{candle::Candle, trade::PublicTrade};
use harbor_exchange::kline::Interval;
use harbor_instrument::{MarketKey, Side};
use serde::Deserialize;
use std::path::PathBuf;

/// CSV candle feed.
///
/// Expected header: `time,open,high,low,close,volume` with RFC 3339 times.
#[derive(Debug)]
pub struct CsvCandleData {
    path: PathBuf,
    series: TickSeries,
}

#[derive(Debug, Deserialize)]
struct CsvCandleRecord {
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvCandleData {
    pub fn new(key: MarketKey, interval: Interval, path: PathBuf) -> Self {
        Self {
            path,
            series: TickSeries::new(key, interval),
        }
    }
}

impl DataHandler for CsvCandleData {
    fn key(&self) -> &MarketKey {
        self.series.key()
    }

    fn interval(&self) -> Interval {
        self.series.interval()
    }

    fn load(&mut self) -> Result<(), DataFeedError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let interval = self.series.interval();
        let key = self.series.key().clone();

        let mut ticks = Vec::new();
        for (line, record) in reader.deserialize::<CsvCandleRecord>().enumerate() {
            let record = record.map_err(|error| DataFeedError::Malformed {
                line: line as u64 + 2,
                reason: error.to_string(),
            })?;

            if record.low > record.high {
                return Err(DataFeedError::Malformed {
                    line: line as u64 + 2,
                    reason: "candle low exceeds high".to_string(),
                });
            }

            ticks.push(DataTick {
                meta: EventMeta::new(key.clone(), record.time, interval),
                candle: Candle {
                    close_time: record.time + interval.duration(),
                    open: record.open,
                    high: record.high,
                    low: record.low,
                    close: record.close,
                    volume: record.volume,
                    trade_count: 0,
                },
                trades: vec![],
            });
        }

        self.series.set_ticks(ticks)
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

/// CSV trade tape feed, bucketized into candles at load.
///
/// Expected header: `time,price,amount,side` with RFC 3339 times.
#[derive(Debug)]
pub struct CsvTradeData {
    path: PathBuf,
    series: TickSeries,
}

#[derive(Debug, Deserialize)]
struct CsvTradeRecord {
    time: DateTime<Utc>,
    price: f64,
    amount: f64,
    side: Side,
}

impl CsvTradeData {
    pub fn new(key: MarketKey, interval: Interval, path: PathBuf) -> Self {
        Self {
            path,
            series: TickSeries::new(key, interval),
        }
    }
}

impl DataHandler for CsvTradeData {
    fn key(&self) -> &MarketKey {
        self.series.key()
    }

    fn interval(&self) -> Interval {
        self.series.interval()
    }

    fn load(&mut self) -> Result<(), DataFeedError> {
        let mut reader = csv::Reader::from_path(&self.path)?;

        let mut trades = Vec::new();
        for (line, record) in reader.deserialize::<CsvTradeRecord>().enumerate() {
            let record = record.map_err(|error| DataFeedError::Malformed {
                line: line as u64 + 2,
                reason: error.to_string(),
            })?;
            trades.push((
                record.time,
                PublicTrade {
                    id: (line + 1).to_string(),
                    price: record.price,
                    amount: record.amount,
                    side: record.side,
                },
            ));
        }

        let ticks = convert_to_candles(
            self.series.key(),
            self.series.interval(),
            trades,
        );
        self.series.set_ticks(ticks)
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
    use harbor_instrument::{asset::AssetClass, exchange::VenueId, pair::Pair};
    use std::io::Write;

    fn key() -> MarketKey {
        MarketKey::new(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            Pair::new("btc", "usdt"),
        )
    }

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_candle_load_and_iterate() {
        let path = write_temp(
            "harbor_test_candles.csv",
            "time,open,high,low,close,volume\n\
             2020-01-01T00:00:00Z,100.0,110.0,95.0,105.0,1000.0\n\
             2020-01-01T01:00:00Z,105.0,115.0,100.0,110.0,1500.0\n",
        );

        let mut feed = CsvCandleData::new(key(), Interval::OneHour, path);
        feed.load().unwrap();

        assert_eq!(feed.next().unwrap().candle.close, 105.0);
        assert_eq!(feed.next().unwrap().candle.close, 110.0);
        assert!(feed.next().is_none());

        feed.reset();
        assert_eq!(feed.next().unwrap().candle.close, 105.0);
    }

    #[test]
    fn test_csv_candle_rejects_low_above_high() {
        let path = write_temp(
            "harbor_test_bad_candles.csv",
            "time,open,high,low,close,volume\n\
             2020-01-01T00:00:00Z,100.0,90.0,95.0,105.0,1000.0\n",
        );

        let mut feed = CsvCandleData::new(key(), Interval::OneHour, path);
        assert!(matches!(
            feed.load(),
            Err(DataFeedError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_csv_trades_bucketize() {
        let path = write_temp(
            "harbor_test_trades.csv",
            "time,price,amount,side\n\
             2020-01-01T01:00:00Z,1337.0,1337.0,buy\n\
             2020-01-01T01:00:01Z,1337.0,1337.0,buy\n\
             2020-01-01T01:01:00Z,-1337.0,-1337.0,buy\n",
        );

        let mut feed = CsvTradeData::new(key(), Interval::FifteenSeconds, path);
        feed.load().unwrap();

        let first = feed.next().unwrap();
        assert_eq!(first.trades.len(), 2);
        let second = feed.next().unwrap();
        assert_eq!(second.trades[0].side, Side::Sell);
        assert!(feed.next().is_none());
    }
}
