use crate::{
    exchange::Connector,
    instrument::{InstrumentData, MarketInstrument},
};
use derive_more::Display;
use harbor_exchange::kline::{Interval, KlineError};
use harbor_instrument::{MarketKey, exchange::VenueId};
use harbor_integration::{
    Validator, error::SocketError, protocol::websocket::WsMessage, subscription::SubscriptionId,
};
use serde::{Deserialize, Serialize};
use std::{
    borrow::Borrow,
    fmt::{Debug, Display, Formatter},
    hash::Hash,
};

/// OrderBook [`SubscriptionKind`]s and the associated Harbor output data models.
pub mod book;

/// Candle [`SubscriptionKind`] and the associated Harbor output data model.
pub mod candle;

/// Ticker [`SubscriptionKind`] and the associated Harbor output data model.
pub mod ticker;

/// Public trade [`SubscriptionKind`] and the associated Harbor output data model.
pub mod trade;

/// Defines the type of a [`Subscription`], and the output [`Self::Event`] that it yields.
pub trait SubscriptionKind
where
    Self: Debug + Clone,
{
    type Event: Debug;
    fn as_str(&self) -> &'static str;
}

/// Harbor [`Subscription`] used to subscribe to a [`SubscriptionKind`] for a particular venue
/// market.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Subscription<Exchange = VenueId, Inst = MarketInstrument, Kind = SubKind> {
    pub exchange: Exchange,
    #[serde(flatten)]
    pub instrument: Inst,
    #[serde(alias = "type")]
    pub kind: Kind,
}

/// Runtime-tagged [`SubscriptionKind`], used in configs and roster templates.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SubKind {
    PublicTrades,
    Tickers,
    OrderBooksL2,
    Candles,
}

impl<Exchange, Instrument, Kind> Display for Subscription<Exchange, Instrument, Kind>
where
    Exchange: Display,
    Instrument: Debug,
    Kind: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{:?}", self.exchange, self.kind, self.instrument)
    }
}

impl<Exchange, I, Instrument, Kind> From<(Exchange, I, Kind)>
    for Subscription<Exchange, Instrument, Kind>
where
    I: Into<Instrument>,
{
    fn from((exchange, instrument, kind): (Exchange, I, Kind)) -> Self {
        Self::new(exchange, instrument, kind)
    }
}

impl<Instrument, Exchange, Kind> Subscription<Exchange, Instrument, Kind> {
    /// Constructs a new [`Subscription`] using the provided configuration.
    pub fn new<I>(exchange: Exchange, instrument: I, kind: Kind) -> Self
    where
        I: Into<Instrument>,
    {
        Self {
            exchange,
            instrument: instrument.into(),
            kind,
        }
    }
}

/// A subscription roster template over markets, expanded into a concrete roster per venue.
///
/// Candle templates carry an [`Interval`] that is validated against the venue's supported
/// intervals at expand time.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize)]
pub struct SubscriptionTemplate {
    pub kind: SubKind,
    pub interval: Option<Interval>,
    pub levels: Option<usize>,
}

/// Expand roster [`SubscriptionTemplate`]s over the provided markets into concrete
/// [`Subscription`]s, validating any candle intervals against the venue supported set.
pub fn expand_templates(
    venue: VenueId,
    markets: &[MarketKey],
    templates: &[SubscriptionTemplate],
    supported_intervals: &[Interval],
) -> Result<Vec<Subscription<VenueId, MarketInstrument, SubKind>>, KlineError> {
    let mut roster = Vec::with_capacity(markets.len() * templates.len());
    for template in templates {
        if template.kind == SubKind::Candles {
            let interval = template
                .interval
                .ok_or(KlineError::UnknownInterval("missing interval".to_string()))?;
            if !supported_intervals.contains(&interval) {
                return Err(KlineError::UnsupportedInterval(interval));
            }
        }
        for market in markets {
            roster.push(Subscription::new(venue, market.clone(), template.kind));
        }
    }
    Ok(roster)
}

impl<Exchange, Kind> Validator for &Subscription<Exchange, MarketInstrument, Kind>
where
    Exchange: Connector,
{
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized,
    {
        // Validate the venue supports the Subscription AssetClass
        let exchange = Exchange::ID;
        if Exchange::supports_asset(self.instrument.asset()) {
            Ok(self)
        } else {
            Err(SocketError::Unsupported {
                entity: exchange.as_str(),
                item: self.instrument.asset().to_string(),
            })
        }
    }
}

/// Metadata generated from a collection of Harbor [`Subscription`]s, including the venue
/// specific subscription payloads that are sent to the venue.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SubscriptionMeta<InstrumentKey> {
    /// `HashMap` containing the mapping between a [`SubscriptionId`] and
    /// it's associated Harbor instrument key.
    pub instrument_map: Map<InstrumentKey>,
    /// Collection of [`WsMessage`]s containing venue specific subscription payloads to be sent.
    pub ws_subscriptions: Vec<WsMessage>,
}

/// New type `HashMap` that maps a [`SubscriptionId`] to some associated type `T`.
///
/// Used by [`ExchangeTransformer`](crate::transformer::ExchangeTransformer)s to identify the
/// Harbor instrument associated with incoming venue messages.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Map<T>(pub fnv::FnvHashMap<SubscriptionId, T>);

impl<T> FromIterator<(SubscriptionId, T)> for Map<T> {
    fn from_iter<Iter>(iter: Iter) -> Self
    where
        Iter: IntoIterator<Item = (SubscriptionId, T)>,
    {
        Self(iter.into_iter().collect())
    }
}

impl<T> Map<T> {
    /// Find the `T` associated with the provided [`SubscriptionId`].
    pub fn find<SubId>(&self, id: &SubId) -> Result<&T, SocketError>
    where
        SubscriptionId: Borrow<SubId>,
        SubId: AsRef<str> + Hash + Eq + ?Sized,
    {
        self.0
            .get(id)
            .ok_or_else(|| SocketError::Unidentifiable(SubscriptionId::from(id.as_ref())))
    }

    /// Find the mutable reference to `T` associated with the provided [`SubscriptionId`].
    pub fn find_mut<SubId>(&mut self, id: &SubId) -> Result<&mut T, SocketError>
    where
        SubscriptionId: Borrow<SubId>,
        SubId: AsRef<str> + Hash + Eq + ?Sized,
    {
        self.0
            .get_mut(id)
            .ok_or_else(|| SocketError::Unidentifiable(SubscriptionId::from(id.as_ref())))
    }
}
