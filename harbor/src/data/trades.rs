use crate::event::{DataTick, EventMeta};
use chrono::{DateTime, TimeZone, Utc};
use harbor_data::subscription::{candle::Candle, trade::PublicTrade};
use harbor_exchange::kline::Interval;
use harbor_instrument::MarketKey;

/// Bucketize a trade tape into OHLCV candles at the provided [`Interval`].
///
/// A trade is assigned to the bucket `floor(timestamp / interval)`; empty buckets are omitted.
/// Trades are normalised at ingress: negative price or amount flips to positive magnitude with
/// the side inverted.
///
/// Each produced [`DataTick`] retains the trades that formed it, so the simulated exchange can
/// walk the tape when filling orders.
pub fn convert_to_candles(
    key: &MarketKey,
    interval: Interval,
    trades: Vec<(DateTime<Utc>, PublicTrade)>,
) -> Vec<DataTick> {
    let step = interval.duration().num_seconds();
    if step <= 0 {
        return Vec::new();
    }

    let mut buckets: Vec<(i64, Vec<(DateTime<Utc>, PublicTrade)>)> = Vec::new();
    for (time, trade) in trades {
        let trade = trade.normalise();
        let bucket = time.timestamp().div_euclid(step);
        match buckets.iter_mut().find(|(existing, _)| *existing == bucket) {
            Some((_, bucket_trades)) => bucket_trades.push((time, trade)),
            None => buckets.push((bucket, vec![(time, trade)])),
        }
    }
    buckets.sort_by_key(|(bucket, _)| *bucket);

    buckets
        .into_iter()
        .map(|(bucket, mut bucket_trades)| {
            bucket_trades.sort_by_key(|(time, _)| *time);

            let open = bucket_trades[0].1.price;
            let close = bucket_trades[bucket_trades.len() - 1].1.price;
            let high = bucket_trades
                .iter()
                .map(|(_, trade)| trade.price)
                .fold(f64::MIN, f64::max);
            let low = bucket_trades
                .iter()
                .map(|(_, trade)| trade.price)
                .fold(f64::MAX, f64::min);
            let volume = bucket_trades.iter().map(|(_, trade)| trade.amount).sum();

            let bucket_start = Utc
                .timestamp_opt(bucket * step, 0)
                .single()
                .unwrap_or_default();

            DataTick {
                meta: EventMeta::new(key.clone(), bucket_start, interval),
                candle: Candle {
                    close_time: bucket_start + interval.duration(),
                    open,
                    high,
                    low,
                    close,
                    volume,
                    trade_count: bucket_trades.len() as u64,
                },
                trades: bucket_trades.into_iter().map(|(_, trade)| trade).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_instrument::{Side, asset::AssetClass, exchange::VenueId, pair::Pair};

    fn key() -> MarketKey {
        MarketKey::new(
            VenueId::BinanceSpot,
            AssetClass::Spot,
            Pair::new("btc", "usdt"),
        )
    }

    fn trade(price: f64, amount: f64, side: Side) -> PublicTrade {
        PublicTrade {
            id: "id".to_string(),
            price,
            amount,
            side,
        }
    }

    #[test]
    fn test_convert_to_candles_buckets_and_normalises() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 1).unwrap();
        let t2 = Utc.with_ymd_and_hms(2020, 1, 1, 1, 1, 0).unwrap();

        let trades = vec![
            (t0, trade(1337.0, 1337.0, Side::Buy)),
            (t1, trade(1337.0, 1337.0, Side::Buy)),
            // Negative price & amount: normalised to positive magnitude, side flipped to sell
            (t2, trade(-1337.0, -1337.0, Side::Buy)),
        ];

        let candles = convert_to_candles(&key(), Interval::FifteenSeconds, trades);

        // Two 15s buckets: [01:00:00, 01:00:15) and [01:01:00, 01:01:15)
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].meta.time, t0);
        assert_eq!(candles[0].candle.volume, 2674.0);
        assert_eq!(candles[0].trades.len(), 2);

        assert_eq!(candles[1].meta.time, t2);
        assert_eq!(candles[1].candle.close, 1337.0);
        assert_eq!(candles[1].trades[0].price, 1337.0);
        assert_eq!(candles[1].trades[0].amount, 1337.0);
        assert_eq!(candles[1].trades[0].side, Side::Sell);
    }

    #[test]
    fn test_empty_buckets_are_omitted() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        // Next trade a full hour later at 15s interval: every bucket between is omitted
        let t1 = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap();

        let trades = vec![
            (t0, trade(100.0, 1.0, Side::Buy)),
            (t1, trade(110.0, 1.0, Side::Sell)),
        ];

        let candles = convert_to_candles(&key(), Interval::FifteenSeconds, trades);
        assert_eq!(candles.len(), 2);
    }

    #[test]
    fn test_ohlc_aggregation() {
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let trades = vec![
            (base, trade(100.0, 1.0, Side::Buy)),
            (base + chrono::TimeDelta::seconds(1), trade(120.0, 1.0, Side::Buy)),
            (base + chrono::TimeDelta::seconds(2), trade(90.0, 1.0, Side::Sell)),
            (base + chrono::TimeDelta::seconds(3), trade(105.0, 1.0, Side::Sell)),
        ];

        let candles = convert_to_candles(&key(), Interval::FifteenSeconds, trades);
        assert_eq!(candles.len(), 1);
        let candle = &candles[0].candle;
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 120.0);
        assert_eq!(candle.low, 90.0);
        assert_eq!(candle.close, 105.0);
        assert_eq!(candle.volume, 4.0);
        assert_eq!(candle.trade_count, 4);
    }
}
