use super::DataHandler;
use crate::{error::DataFeedError, event::DataTick};
use harbor_exchange::kline::Interval;
use harbor_instrument::MarketKey;
use tokio::sync::mpsc;

/// Live feed bridged from a `harbor-data` market stream.
///
/// A bridging task converts streamed candles into [`DataTick`]s and sends them into this feed's
/// channel; `next` drains without blocking, per the [`DataHandler`] contract, so the engine loop
/// stays cooperative.
#[derive(Debug)]
pub struct LiveCandleData {
    rx: mpsc::UnboundedReceiver<DataTick>,
    served: Vec<DataTick>,
    key: MarketKey,
    interval: Interval,
}

impl LiveCandleData {
    /// Construct a new [`LiveCandleData`], returning the sender the bridging task feeds.
    pub fn new(key: MarketKey, interval: Interval) -> (Self, mpsc::UnboundedSender<DataTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                served: Vec::new(),
                key,
                interval,
            },
            tx,
        )
    }
}

impl DataHandler for LiveCandleData {
    fn key(&self) -> &MarketKey {
        &self.key
    }

    fn interval(&self) -> Interval {
        self.interval
    }

    fn load(&mut self) -> Result<(), DataFeedError> {
        // Live data has no stored range to validate
        Ok(())
    }

    fn next(&mut self) -> Option<DataTick> {
        match self.rx.try_recv() {
            Ok(tick) => {
                self.served.push(tick.clone());
                Some(tick)
            }
            Err(_) => None,
        }
    }

    fn reset(&mut self) {
        // A live stream cannot rewind; only the served history resets
        self.served.clear();
    }

    fn history(&self) -> &[DataTick] {
        &self.served
    }

    fn latest(&self) -> Option<&DataTick> {
        self.served.last()
    }

    fn offset(&self) -> usize {
        self.served.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_util::{market_key, tick};

    #[test]
    fn test_live_feed_drains_without_blocking() {
        let (mut feed, tx) = LiveCandleData::new(market_key(), Interval::OneHour);

        assert!(feed.next().is_none());

        tx.send(tick(0, 100.0)).unwrap();
        tx.send(tick(1, 101.0)).unwrap();

        assert_eq!(feed.next().unwrap().candle.close, 100.0);
        assert_eq!(feed.latest().unwrap().candle.close, 100.0);
        assert_eq!(feed.next().unwrap().candle.close, 101.0);
        assert!(feed.next().is_none());
        assert_eq!(feed.offset(), 2);
    }
}
