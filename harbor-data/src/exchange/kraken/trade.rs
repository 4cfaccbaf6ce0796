use super::channel::KrakenChannel;
use crate::{
    Identifier,
    event::{MarketEvent, MarketIter},
    exchange::subscription::ExchangeSub,
    subscription::trade::PublicTrade,
};
use chrono::{DateTime, Utc};
use harbor_instrument::{Side, exchange::VenueId};
use harbor_integration::subscription::SubscriptionId;
use serde::{Deserialize, Serialize};

/// [`Kraken`](super::Kraken) real-time trades message, carrying a batch of trades for one
/// market.
///
/// ### Raw Payload Examples
/// See docs: <https://docs.kraken.com/api/docs/websocket-v2/trade>
/// ```json
/// {
///     "channel": "trade",
///     "type": "update",
///     "data": [
///         {
///             "symbol": "BTC/USD",
///             "side": "buy",
///             "price": 6621.55,
///             "qty": 0.163567,
///             "ord_type": "limit",
///             "trade_id": 4665906,
///             "timestamp": "2023-09-25T07:49:37.708706Z"
///         }
///     ]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct KrakenTrades {
    #[serde(rename = "channel")]
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<KrakenTrade>,
}

/// Single [`Kraken`](super::Kraken) trade.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct KrakenTrade {
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    pub trade_id: u64,
    pub timestamp: DateTime<Utc>,
}

impl Identifier<Option<SubscriptionId>> for KrakenTrades {
    fn id(&self) -> Option<SubscriptionId> {
        if self.channel != KrakenChannel::TRADES.0 {
            return None;
        }
        self.data
            .first()
            .map(|trade| ExchangeSub::from((KrakenChannel::TRADES, trade.symbol.as_str())).id())
    }
}

impl<InstrumentKey> From<(VenueId, InstrumentKey, KrakenTrades)>
    for MarketIter<InstrumentKey, PublicTrade>
where
    InstrumentKey: Clone,
{
    fn from((exchange_id, instrument, trades): (VenueId, InstrumentKey, KrakenTrades)) -> Self {
        trades
            .data
            .into_iter()
            .map(|trade| {
                Ok(MarketEvent {
                    time_exchange: trade.timestamp,
                    time_received: Utc::now(),
                    exchange: exchange_id,
                    instrument: instrument.clone(),
                    kind: PublicTrade {
                        id: trade.trade_id.to_string(),
                        price: trade.price,
                        amount: trade.qty,
                        side: trade.side,
                    }
                    .normalise(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_kraken_trades() {
        let input = r#"
        {
            "channel": "trade",
            "type": "update",
            "data": [
                {
                    "symbol": "BTC/USD",
                    "side": "buy",
                    "price": 6621.55,
                    "qty": 0.163567,
                    "ord_type": "limit",
                    "trade_id": 4665906,
                    "timestamp": "2023-09-25T07:49:37.708706Z"
                }
            ]
        }
        "#;

        let actual = serde_json::from_str::<KrakenTrades>(input).unwrap();
        assert_eq!(actual.data.len(), 1);
        assert_eq!(actual.data[0].side, Side::Buy);
        assert_eq!(
            actual.id(),
            Some(SubscriptionId::from("trade|BTC/USD"))
        );
    }
}
