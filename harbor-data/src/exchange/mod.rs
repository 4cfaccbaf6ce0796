use self::subscription::ExchangeSub;
use crate::{
    MarketStream, SnapshotFetcher,
    instrument::InstrumentData,
    subscriber::{Subscriber, validator::SubscriptionValidator},
    subscription::{Map, SubscriptionKind},
};
use harbor_instrument::{asset::AssetClass, exchange::VenueId};
use harbor_integration::{Validator, error::SocketError, protocol::websocket::WsMessage};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, time::Duration};
use url::Url;

/// `BinanceSpot` & `BinanceFuturesUsd` [`Connector`] and [`StreamSelector`] implementations.
pub mod binance;

/// `Kraken` [`Connector`] and [`StreamSelector`] implementations.
pub mod kraken;

/// `Okx` [`Connector`] and [`StreamSelector`] implementations.
pub mod okx;

/// Defines the generic [`ExchangeSub`] containing a market and channel combination used by a
/// venue [`Connector`] to build [`WsMessage`] subscription payloads.
pub mod subscription;

/// Default [`Duration`] the [`Connector::SubValidator`] will wait to receive all success
/// responses to actioned `Subscription` requests.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Defines the [`MarketStream`] kind associated with a venue
/// `Subscription` [`SubscriptionKind`].
///
/// ### Notes
/// Must be implemented by a venue [`Connector`] if it supports a specific [`SubscriptionKind`].
pub trait StreamSelector<Instrument, Kind>
where
    Self: Connector,
    Instrument: InstrumentData,
    Kind: SubscriptionKind,
{
    type SnapFetcher: SnapshotFetcher<Self, Kind>;
    type Stream: MarketStream<Self, Instrument, Kind>;
}

/// Primary venue abstraction. Defines how to translate Harbor types into venue specific types,
/// as well as connecting, subscribing, and interacting with the venue server.
///
/// ### Notes
/// This must be implemented for a new venue integration!
pub trait Connector
where
    Self: Clone + Default + Debug + Sized,
{
    /// Unique identifier for the venue server being connected with.
    const ID: VenueId;

    /// Type that defines how to translate a Harbor `Subscription` into a venue specific channel
    /// to be subscribed to.
    ///
    /// ### Examples
    /// - `BinanceChannel("@depth@100ms")`
    /// - `KrakenChannel("trade")`
    type Channel: AsRef<str>;

    /// Type that defines how to translate a Harbor `Subscription` into a venue specific market
    /// that can be subscribed to.
    ///
    /// ### Examples
    /// - `BinanceMarket("btcusdt")`
    /// - `KrakenMarket("BTC/USDT")`
    type Market: AsRef<str>;

    /// [`Subscriber`] type that establishes a connection with the venue server, and actions
    /// `Subscription`s over the socket.
    type Subscriber: Subscriber;

    /// [`SubscriptionValidator`] type that listens to responses from the venue server and
    /// validates if the actioned `Subscription`s were successful.
    type SubValidator: SubscriptionValidator;

    /// Deserialisable type the [`Self::SubValidator`] expects to receive from the venue server
    /// in response to the `Subscription` [`Self::requests`] sent over the websocket. Implements
    /// [`Validator`] in order to determine if [`Self`] communicates a successful `Subscription`
    /// outcome.
    type SubResponse: Validator + Debug + DeserializeOwned;

    /// Base [`Url`] of the venue server being connected with.
    fn url() -> Result<Url, SocketError>;

    /// Defines [`PingInterval`] of custom application-level websocket pings for the venue
    /// server being connected with.
    ///
    /// Defaults to `None`, meaning that no custom pings are sent.
    fn ping_interval() -> Option<PingInterval> {
        None
    }

    /// Defines how to translate a collection of [`ExchangeSub`]s into the [`WsMessage`]
    /// subscription payloads sent to the venue server.
    fn requests(exchange_subs: Vec<ExchangeSub<Self::Channel, Self::Market>>) -> Vec<WsMessage>;

    /// Number of `Subscription` responses expected from the venue server in response to the
    /// requests sent. Used to validate all `Subscription`s were accepted.
    fn expected_responses<InstrumentKey>(map: &Map<InstrumentKey>) -> usize {
        map.0.len()
    }

    /// Expected [`Duration`] the [`SubscriptionValidator`] will wait to receive all success
    /// responses to actioned `Subscription` requests.
    fn subscription_timeout() -> Duration {
        DEFAULT_SUBSCRIPTION_TIMEOUT
    }

    /// Determine if this venue serves the provided [`AssetClass`].
    fn supports_asset(asset: AssetClass) -> bool;
}

/// Used when a venue serves distinct [`AssetClass`] market data on distinct servers, allowing
/// all the [`Connector`] logic to be identical apart from what this trait provides.
///
/// ### Examples
/// - `BinanceServerSpot`
/// - `BinanceServerFuturesUsd`
pub trait ExchangeServer: Default + Debug + Clone + Send {
    const ID: VenueId;
    fn websocket_url() -> &'static str;
}

/// Defines the frequency and construction function for custom websocket pings - used for venues
/// that require additional application-level pings.
#[derive(Debug)]
pub struct PingInterval {
    pub interval: tokio::time::Interval,
    pub ping: fn() -> WsMessage,
}
