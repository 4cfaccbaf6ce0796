use chrono::{DateTime, TimeDelta, Utc};
use harbor_instrument::{asset::AssetClass, pair::Pair};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;
use thiserror::Error;

/// Candle interval supported across venues.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    OneSecond,
    FifteenSeconds,
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
}

impl Interval {
    /// Duration of one candle at this [`Interval`].
    pub fn duration(&self) -> TimeDelta {
        match self {
            Interval::OneSecond => TimeDelta::seconds(1),
            Interval::FifteenSeconds => TimeDelta::seconds(15),
            Interval::OneMinute => TimeDelta::minutes(1),
            Interval::FiveMinutes => TimeDelta::minutes(5),
            Interval::FifteenMinutes => TimeDelta::minutes(15),
            Interval::ThirtyMinutes => TimeDelta::minutes(30),
            Interval::OneHour => TimeDelta::hours(1),
            Interval::FourHours => TimeDelta::hours(4),
            Interval::OneDay => TimeDelta::days(1),
            Interval::OneWeek => TimeDelta::weeks(1),
        }
    }

    /// Interval identifier `&str`, matching the serde snake_case representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneSecond => "one_second",
            Interval::FifteenSeconds => "fifteen_seconds",
            Interval::OneMinute => "one_minute",
            Interval::FiveMinutes => "five_minutes",
            Interval::FifteenMinutes => "fifteen_minutes",
            Interval::ThirtyMinutes => "thirty_minutes",
            Interval::OneHour => "one_hour",
            Interval::FourHours => "four_hours",
            Interval::OneDay => "one_day",
            Interval::OneWeek => "one_week",
        }
    }

    fn all() -> &'static [Interval] {
        &[
            Interval::OneSecond,
            Interval::FifteenSeconds,
            Interval::OneMinute,
            Interval::FiveMinutes,
            Interval::FifteenMinutes,
            Interval::ThirtyMinutes,
            Interval::OneHour,
            Interval::FourHours,
            Interval::OneDay,
            Interval::OneWeek,
        ]
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Interval {
    type Err = KlineError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Interval::all()
            .iter()
            .find(|interval| interval.as_str().eq_ignore_ascii_case(input))
            .copied()
            .ok_or_else(|| KlineError::UnknownInterval(input.to_string()))
    }
}

/// Errors generated when constructing kline requests.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum KlineError {
    #[error("unknown interval: {0}")]
    UnknownInterval(String),

    #[error("asset class {0} does not serve klines on this venue")]
    UnsupportedAsset(AssetClass),

    #[error("interval {0} is not supported by this venue")]
    UnsupportedInterval(Interval),

    #[error("interval {requested} cannot be constructed from the venue supported intervals")]
    IntervalNotConstructible { requested: Interval },

    #[error("kline request start {start} is not before end {end}")]
    StartAfterEnd {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("kline request needs {required} candles, exceeding the single-request limit {limit}")]
    RangeExceedsLimit { required: u64, limit: u64 },
}

/// A normalised venue kline request with explicit start/end and a request-formatted symbol.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct KlineRequest {
    pub pair: Pair,
    pub asset: AssetClass,
    pub symbol: SmolStr,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Number of candles this request covers.
    pub count: u64,
}

impl KlineRequest {
    /// Construct a validated [`KlineRequest`].
    ///
    /// The requested [`Interval`] must be directly supported by the venue, or constructible by
    /// aggregating a supported interval that evenly divides it.
    pub fn new(
        pair: Pair,
        asset: AssetClass,
        symbol: SmolStr,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        supported: &[Interval],
        limit: u64,
    ) -> Result<Self, KlineError> {
        if start >= end {
            return Err(KlineError::StartAfterEnd { start, end });
        }
        validate_interval(interval, supported)?;

        let count = interval_count(start, end, interval);
        if count > limit {
            return Err(KlineError::RangeExceedsLimit {
                required: count,
                limit,
            });
        }

        Ok(Self {
            pair,
            asset,
            symbol,
            interval,
            start,
            end,
            count,
        })
    }
}

/// A kline request over a range larger than one venue call, split into batches by a
/// [`RangeHolder`] that records which sub-ranges were covered.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExtendedKlineRequest {
    pub pair: Pair,
    pub asset: AssetClass,
    pub symbol: SmolStr,
    pub interval: Interval,
    pub ranges: RangeHolder,
}

impl ExtendedKlineRequest {
    pub fn new(
        pair: Pair,
        asset: AssetClass,
        symbol: SmolStr,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        supported: &[Interval],
        limit: u64,
    ) -> Result<Self, KlineError> {
        if start >= end {
            return Err(KlineError::StartAfterEnd { start, end });
        }
        validate_interval(interval, supported)?;

        Ok(Self {
            pair,
            asset,
            symbol,
            interval,
            ranges: RangeHolder::new(start, end, interval, limit),
        })
    }
}

fn validate_interval(interval: Interval, supported: &[Interval]) -> Result<(), KlineError> {
    if supported.is_empty() {
        return Err(KlineError::UnsupportedInterval(interval));
    }
    if supported.contains(&interval) {
        return Ok(());
    }

    // Not directly supported: constructible only if a supported interval evenly divides it
    let requested_secs = interval.duration().num_seconds();
    let constructible = supported.iter().any(|candidate| {
        let candidate_secs = candidate.duration().num_seconds();
        candidate_secs < requested_secs && requested_secs % candidate_secs == 0
    });

    if constructible {
        Ok(())
    } else {
        Err(KlineError::IntervalNotConstructible {
            requested: interval,
        })
    }
}

fn div_ceil_i64(lhs: i64, rhs: i64) -> i64 {
    let d = lhs / rhs;
    let r = lhs % rhs;
    if (r > 0 && rhs > 0) || (r < 0 && rhs < 0) {
        d + 1
    } else {
        d
    }
}

fn interval_count(start: DateTime<Utc>, end: DateTime<Utc>, interval: Interval) -> u64 {
    let span = (end - start).num_seconds();
    let step = interval.duration().num_seconds();
    div_ceil_i64(span, step).max(0) as u64
}

/// One contiguous `[start, end)` time range.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Splits a kline range into batches within a venue's per-call limit and tracks which intervals
/// have been filled with data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RangeHolder {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Interval,
    pub intervals_expected: u64,
    batches: Vec<TimeRange>,
    covered: Vec<bool>,
}

impl RangeHolder {
    /// Construct a new [`RangeHolder`] splitting `[start, end)` into batches of at most
    /// `limit` intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, interval: Interval, limit: u64) -> Self {
        let intervals_expected = interval_count(start, end, interval);
        let step = interval.duration();
        let limit = limit.max(1);

        let mut batches = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let batch_end = std::cmp::min(cursor + step * limit as i32, end);
            batches.push(TimeRange {
                start: cursor,
                end: batch_end,
            });
            cursor = batch_end;
        }

        let covered = vec![false; batches.len()];
        Self {
            start,
            end,
            interval,
            intervals_expected,
            batches,
            covered,
        }
    }

    /// The batched sub-ranges, each within the venue per-call limit.
    pub fn batches(&self) -> &[TimeRange] {
        &self.batches
    }

    /// Record that the batch containing `time` has been covered with data.
    pub fn mark_covered(&mut self, time: DateTime<Utc>) {
        if let Some(index) = self
            .batches
            .iter()
            .position(|range| range.start <= time && time < range.end)
        {
            self.covered[index] = true;
        }
    }

    /// Number of intervals present across covered batches.
    pub fn intervals_present(&self) -> u64 {
        self.batches
            .iter()
            .zip(&self.covered)
            .filter(|(_, covered)| **covered)
            .map(|(range, _)| interval_count(range.start, range.end, self.interval))
            .sum()
    }

    /// Sub-ranges not yet covered with data.
    pub fn unfilled(&self) -> Vec<TimeRange> {
        self.batches
            .iter()
            .zip(&self.covered)
            .filter(|(_, covered)| !**covered)
            .map(|(range, _)| *range)
            .collect()
    }

    /// Determine if every batch has been covered.
    pub fn is_complete(&self) -> bool {
        self.covered.iter().all(|covered| *covered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_kline_request_validation() {
        struct TestCase {
            interval: Interval,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            supported: Vec<Interval>,
            limit: u64,
            expected: Result<u64, KlineError>,
        }

        let tests = vec![
            TestCase {
                // TC0: valid request of 4 hourly candles
                interval: Interval::OneHour,
                start: ts(0),
                end: ts(4),
                supported: vec![Interval::OneHour],
                limit: 100,
                expected: Ok(4),
            },
            TestCase {
                // TC1: start after end
                interval: Interval::OneHour,
                start: ts(4),
                end: ts(0),
                supported: vec![Interval::OneHour],
                limit: 100,
                expected: Err(KlineError::StartAfterEnd {
                    start: ts(4),
                    end: ts(0),
                }),
            },
            TestCase {
                // TC2: unsupported but constructible interval (4h from 1h)
                interval: Interval::FourHours,
                start: ts(0),
                end: ts(8),
                supported: vec![Interval::OneHour],
                limit: 100,
                expected: Ok(2),
            },
            TestCase {
                // TC3: non-constructible interval (1m from 1h)
                interval: Interval::OneMinute,
                start: ts(0),
                end: ts(1),
                supported: vec![Interval::OneHour],
                limit: 100,
                expected: Err(KlineError::IntervalNotConstructible {
                    requested: Interval::OneMinute,
                }),
            },
            TestCase {
                // TC4: range exceeds the single-request limit
                interval: Interval::OneHour,
                start: ts(0),
                end: ts(10),
                supported: vec![Interval::OneHour],
                limit: 5,
                expected: Err(KlineError::RangeExceedsLimit {
                    required: 10,
                    limit: 5,
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = KlineRequest::new(
                Pair::new("btc", "usdt"),
                AssetClass::Spot,
                SmolStr::from("BTCUSDT"),
                test.interval,
                test.start,
                test.end,
                &test.supported,
                test.limit,
            );
            match (actual, test.expected) {
                (Ok(request), Ok(count)) => assert_eq!(request.count, count, "TC{index} failed"),
                (Err(actual), Err(expected)) => assert_eq!(actual, expected, "TC{index} failed"),
                (actual, expected) => {
                    panic!("TC{index} failed. \nActual: {actual:?}\nExpected: {expected:?}\n")
                }
            }
        }
    }

    #[test]
    fn test_range_holder_batches_and_coverage() {
        // 10 hourly intervals at a 4-per-call limit => 3 batches (4, 4, 2)
        let mut holder = RangeHolder::new(ts(0), ts(10), Interval::OneHour, 4);
        assert_eq!(holder.intervals_expected, 10);
        assert_eq!(holder.batches().len(), 3);
        assert_eq!(holder.batches()[2], TimeRange { start: ts(8), end: ts(10) });

        holder.mark_covered(ts(0));
        holder.mark_covered(ts(9));
        assert_eq!(holder.intervals_present(), 6);
        assert!(!holder.is_complete());
        assert_eq!(holder.unfilled(), vec![TimeRange { start: ts(4), end: ts(8) }]);

        holder.mark_covered(ts(5));
        assert!(holder.is_complete());
        assert_eq!(holder.intervals_present(), 10);
    }
}
