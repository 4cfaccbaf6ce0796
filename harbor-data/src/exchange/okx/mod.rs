use self::{
    book::OkxBookTransformer, channel::OkxChannel, market::OkxMarket,
    subscription::OkxSubResponse, trade::OkxTrades,
};
use crate::{
    ExchangeWsStream, NoInitialSnapshots,
    exchange::{Connector, PingInterval, StreamSelector, subscription::ExchangeSub},
    instrument::InstrumentData,
    subscriber::{WebSocketSubscriber, validator::WebSocketSubValidator},
    subscription::{book::OrderBooksL2, trade::PublicTrades},
    transformer::stateless::StatelessTransformer,
};
use harbor_instrument::{asset::AssetClass, exchange::VenueId};
use harbor_integration::{
    error::SocketError,
    protocol::websocket::{WebSocketSerdeParser, WsMessage},
};
use serde_json::json;
use url::Url;

/// Checksummed OrderBook types for [`Okx`].
pub mod book;

/// Defines the type that translates a Harbor [`Subscription`](crate::subscription::Subscription)
/// into a venue [`Connector`] specific channel used for generating [`Connector::requests`].
pub mod channel;

/// Defines the type that translates a Harbor [`Subscription`](crate::subscription::Subscription)
/// into a venue [`Connector`] specific market used for generating [`Connector::requests`].
pub mod market;

/// [`Subscription`](crate::subscription::Subscription) response type and response
/// [`Validator`](harbor_integration::Validator) for [`Okx`].
pub mod subscription;

/// Public trade types for [`Okx`].
pub mod trade;

/// [`Okx`] server base url.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-websocket>
pub const BASE_URL_OKX: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// [`Okx`] custom application-level ping interval.
const PING_INTERVAL_OKX: std::time::Duration = std::time::Duration::from_secs(25);

/// Convenient type alias for an Okx [`ExchangeWsStream`] using [`WebSocketSerdeParser`].
pub type OkxWsStream<Transformer> = ExchangeWsStream<WebSocketSerdeParser, Transformer>;

/// [`Okx`] venue.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-websocket>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Okx;

impl Connector for Okx {
    const ID: VenueId = VenueId::Okx;
    type Channel = OkxChannel;
    type Market = OkxMarket;
    type Subscriber = WebSocketSubscriber;
    type SubValidator = WebSocketSubValidator;
    type SubResponse = OkxSubResponse;

    fn url() -> Result<Url, SocketError> {
        Url::parse(BASE_URL_OKX).map_err(SocketError::UrlParse)
    }

    fn ping_interval() -> Option<PingInterval> {
        Some(PingInterval {
            interval: tokio::time::interval(PING_INTERVAL_OKX),
            ping: || WsMessage::text("ping"),
        })
    }

    fn requests(exchange_subs: Vec<ExchangeSub<Self::Channel, Self::Market>>) -> Vec<WsMessage> {
        let args = exchange_subs
            .into_iter()
            .map(|ExchangeSub { channel, market }| {
                json!({
                    "channel": channel.as_ref(),
                    "instId": market.as_ref()
                })
            })
            .collect::<Vec<_>>();

        vec![WsMessage::text(
            json!({
                "op": "subscribe",
                "args": args
            })
            .to_string(),
        )]
    }

    fn supports_asset(asset: AssetClass) -> bool {
        matches!(
            asset,
            AssetClass::Spot | AssetClass::PerpetualSwap | AssetClass::Options
        )
    }
}

impl<Instrument> StreamSelector<Instrument, PublicTrades> for Okx
where
    Instrument: InstrumentData,
{
    type SnapFetcher = NoInitialSnapshots;
    type Stream =
        OkxWsStream<StatelessTransformer<Self, Instrument::Key, PublicTrades, OkxTrades>>;
}

impl<Instrument> StreamSelector<Instrument, OrderBooksL2> for Okx
where
    Instrument: InstrumentData,
{
    type SnapFetcher = NoInitialSnapshots;
    type Stream = OkxWsStream<OkxBookTransformer<Instrument::Key>>;
}

impl<'de> serde::Deserialize<'de> for Okx {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let input = <String as serde::Deserialize>::deserialize(deserializer)?;
        if input.as_str() == Self::ID.as_str() {
            Ok(Self)
        } else {
            Err(serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(input.as_str()),
                &Self::ID.as_str(),
            ))
        }
    }
}

impl serde::Serialize for Okx {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(Self::ID.as_str())
    }
}
