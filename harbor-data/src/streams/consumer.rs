use crate::{
    Identifier, MarketStream,
    error::DataError,
    event::MarketEvent,
    exchange::StreamSelector,
    instrument::InstrumentData,
    streams::reconnect::{
        Event, ReconnectionBackoffPolicy, init_reconnecting_market_stream,
    },
    subscription::{Subscription, SubscriptionKind},
};
use futures::Stream;
use harbor_instrument::exchange::VenueId;
use tracing::info;

/// Default [`ReconnectionBackoffPolicy`] for a reconnecting [`MarketStream`].
pub const STREAM_RECONNECTION_POLICY: ReconnectionBackoffPolicy = ReconnectionBackoffPolicy {
    backoff_ms_initial: 125,
    backoff_multiplier: 2,
    backoff_ms_max: 60000,
};

/// Convenient type alias for a [`MarketEvent`] [`Result`] consumed via a reconnecting
/// [`MarketStream`].
pub type MarketStreamResult<InstrumentKey, Kind> =
    Event<VenueId, Result<MarketEvent<InstrumentKey, Kind>, DataError>>;

/// Convenient type alias for a [`MarketEvent`] consumed via a reconnecting [`MarketStream`].
pub type MarketStreamEvent<InstrumentKey, Kind> =
    Event<VenueId, MarketEvent<InstrumentKey, Kind>>;

/// Initialises a reconnecting [`MarketStream`] using a collection of [`Subscription`]s.
///
/// The provided [`ReconnectionBackoffPolicy`] dictates how the exponential backoff scales
/// between reconnections. Terminal [`DataError`]s (sequence gaps, checksum mismatches) end the
/// inner stream, triggering a re-initialisation that re-issues the full subscription roster and
/// fetches fresh orderbook snapshots.
pub async fn init_market_stream<Exchange, Instrument, Kind>(
    policy: ReconnectionBackoffPolicy,
    subscriptions: Vec<Subscription<Exchange, Instrument, Kind>>,
) -> Result<impl Stream<Item = MarketStreamResult<Instrument::Key, Kind::Event>>, DataError>
where
    Exchange: StreamSelector<Instrument, Kind> + Send + Sync + 'static,
    Instrument: InstrumentData + 'static,
    Kind: SubscriptionKind + Send + Sync + 'static,
    Kind::Event: Send,
    Subscription<Exchange, Instrument, Kind>:
        Identifier<Exchange::Channel> + Identifier<Exchange::Market>,
{
    let exchange = Exchange::ID;
    if subscriptions.is_empty() {
        return Err(DataError::SubscriptionsEmpty);
    }

    info!(
        %exchange,
        ?subscriptions,
        ?policy,
        "MarketStream with auto reconnect running"
    );

    init_reconnecting_market_stream(policy, exchange, move || {
        let subscriptions = subscriptions.clone();
        async move { Exchange::Stream::init::<Exchange::SnapFetcher>(&subscriptions).await }
    })
    .await
}
