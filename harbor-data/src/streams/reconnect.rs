use futures::{Stream, StreamExt};
use harbor_instrument::exchange::VenueId;
use harbor_integration::Terminal;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, future::Future, time::Duration};
use tracing::{info, warn};

/// Reconnecting stream `Event`: either an inner `Stream::Item`, or a marker that the venue
/// connection dropped and is being re-established.
///
/// Consumers such as the [`OrderBookSynchronizer`](crate::books::manager::OrderBookSynchronizer)
/// use the `Reconnecting` marker to invalidate venue state (eg/ mark every local book stale)
/// before the re-issued subscriptions deliver fresh snapshots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Event<Origin, T> {
    /// The venue connection dropped; the roster is being re-issued with backoff.
    Reconnecting(Origin),
    Item(T),
}

impl<Origin, T> From<T> for Event<Origin, T> {
    fn from(value: T) -> Self {
        Self::Item(value)
    }
}

/// Exponential backoff policy between venue reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct ReconnectionBackoffPolicy {
    /// Initial backoff millisecond duration after the first disconnection.
    pub backoff_ms_initial: u64,

    /// Scaling factor applied after each further failed reconnection attempt.
    pub backoff_multiplier: u8,

    /// Ceiling on the backoff duration between reconnection attempts.
    pub backoff_ms_max: u64,
}

/// Current backoff state of one venue connection.
#[derive(Debug, Clone)]
struct ReconnectionBackoff {
    policy: ReconnectionBackoffPolicy,
    current_ms: u64,
}

impl ReconnectionBackoff {
    fn new(policy: ReconnectionBackoffPolicy) -> Self {
        Self {
            current_ms: policy.backoff_ms_initial,
            policy,
        }
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    fn escalate(&mut self) {
        let next = self.current_ms.saturating_mul(self.policy.backoff_multiplier as u64);
        self.current_ms = std::cmp::min(next, self.policy.backoff_ms_max);
    }

    fn reset(&mut self) {
        self.current_ms = self.policy.backoff_ms_initial;
    }
}

struct Driver<FnInit, St> {
    init: FnInit,
    venue: VenueId,
    stream: Option<St>,
    backoff: ReconnectionBackoff,
}

/// Initialise a continually reconnecting venue stream.
///
/// The provided closure re-establishes the connection and re-issues the full subscription
/// roster (fetching fresh orderbook snapshots where the venue requires them). The first
/// connection failure is surfaced to the caller; thereafter:
/// * a terminal item error (sequence gap, checksum mismatch) or inner stream end tears the
///   connection down, yields [`Event::Reconnecting`], and re-initialises with exponential
///   backoff bounded by the policy ceiling,
/// * non-terminal item errors pass through for the consumer to handle,
/// * a successful re-initialisation resets the backoff.
pub async fn init_reconnecting_market_stream<FnInit, InitFut, St, T, E>(
    policy: ReconnectionBackoffPolicy,
    venue: VenueId,
    init: FnInit,
) -> Result<impl Stream<Item = Event<VenueId, Result<T, E>>>, E>
where
    FnInit: Fn() -> InitFut,
    InitFut: Future<Output = Result<St, E>>,
    St: Stream<Item = Result<T, E>> + Unpin,
    E: Terminal + Display,
{
    let initial = init().await?;
    let driver = Driver {
        init,
        venue,
        stream: Some(initial),
        backoff: ReconnectionBackoff::new(policy),
    };

    Ok(futures::stream::unfold(driver, |mut driver| async move {
        loop {
            match driver.stream.as_mut() {
                Some(stream) => match stream.next().await {
                    Some(Ok(item)) => return Some((Event::Item(Ok(item)), driver)),
                    Some(Err(error)) if error.is_terminal() => {
                        warn!(
                            venue = %driver.venue,
                            %error,
                            "MarketStream hit terminal error - reconnecting"
                        );
                        driver.stream = None;
                        return Some((Event::Reconnecting(driver.venue), driver));
                    }
                    Some(Err(error)) => return Some((Event::Item(Err(error)), driver)),
                    None => {
                        warn!(venue = %driver.venue, "MarketStream ended - reconnecting");
                        driver.stream = None;
                        return Some((Event::Reconnecting(driver.venue), driver));
                    }
                },
                None => {
                    tokio::time::sleep(driver.backoff.delay()).await;
                    match (driver.init)().await {
                        Ok(stream) => {
                            info!(venue = %driver.venue, "MarketStream re-initialised");
                            driver.backoff.reset();
                            driver.stream = Some(stream);
                        }
                        Err(error) => {
                            warn!(
                                venue = %driver.venue,
                                %error,
                                backoff = ?driver.backoff.delay(),
                                "failed to re-initialise MarketStream"
                            );
                            driver.backoff.escalate();
                        }
                    }
                }
            }
        }
    }))
}
