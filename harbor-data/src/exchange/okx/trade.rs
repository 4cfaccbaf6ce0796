use super::channel::OkxChannel;
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

/// [`Okx`](super::Okx) real-time trades message.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-public-channel-trades-channel>
/// ```json
/// {
///     "arg": {"channel": "trades", "instId": "BTC-USDT"},
///     "data": [
///         {
///             "instId": "BTC-USDT",
///             "tradeId": "130639474",
///             "px": "42219.9",
///             "sz": "0.12060306",
///             "side": "buy",
///             "ts": "1630048897897"
///         }
///     ]
/// }
/// ```
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OkxTrades {
    #[serde(deserialize_with = "de_okx_trade_subscription_id", rename = "arg")]
    pub subscription_id: SubscriptionId,
    pub data: Vec<OkxTrade>,
}

/// Single [`Okx`](super::Okx) trade.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OkxTrade {
    #[serde(rename = "tradeId")]
    pub id: String,
    #[serde(rename = "px", deserialize_with = "harbor_integration::de::de_str")]
    pub price: f64,
    #[serde(rename = "sz", deserialize_with = "harbor_integration::de::de_str")]
    pub amount: f64,
    pub side: Side,
    #[serde(
        rename = "ts",
        deserialize_with = "harbor_integration::de::de_str_u64_epoch_ms_as_datetime_utc"
    )]
    pub time: DateTime<Utc>,
}

impl Identifier<Option<SubscriptionId>> for OkxTrades {
    fn id(&self) -> Option<SubscriptionId> {
        Some(self.subscription_id.clone())
    }
}

impl<InstrumentKey> From<(VenueId, InstrumentKey, OkxTrades)>
    for MarketIter<InstrumentKey, PublicTrade>
where
    InstrumentKey: Clone,
{
    fn from((exchange_id, instrument, trades): (VenueId, InstrumentKey, OkxTrades)) -> Self {
        trades
            .data
            .into_iter()
            .map(|trade| {
                Ok(MarketEvent {
                    time_exchange: trade.time,
                    time_received: Utc::now(),
                    exchange: exchange_id,
                    instrument: instrument.clone(),
                    kind: PublicTrade {
                        id: trade.id,
                        price: trade.price,
                        amount: trade.amount,
                        side: trade.side,
                    }
                    .normalise(),
                })
            })
            .collect()
    }
}

/// Deserialize an [`OkxTrades`] "arg" (eg/ {"channel": "trades", "instId": "BTC-USDT"}) as the
/// associated [`SubscriptionId`] (eg/ "trades|BTC-USDT").
pub fn de_okx_trade_subscription_id<'de, D>(deserializer: D) -> Result<SubscriptionId, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Arg {
        #[serde(rename = "instId")]
        inst_id: String,
    }

    Arg::deserialize(deserializer)
        .map(|arg| ExchangeSub::from((OkxChannel::TRADES, arg.inst_id)).id())
}
