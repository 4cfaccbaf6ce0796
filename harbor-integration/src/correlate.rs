use crate::error::SocketError;
use fnv::FnvHashMap;
use smol_str::SmolStr;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::sync::oneshot;

/// Unique identifier carried by an authenticated websocket request, used to correlate the
/// asynchronous response frame with its waiter.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequestId(pub SmolStr);

impl RequestId {
    /// Generate a fresh random [`RequestId`].
    pub fn random() -> Self {
        Self(SmolStr::from(uuid::Uuid::new_v4().to_string()))
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlates authenticated request ids with their response payloads.
///
/// A connection reader task calls [`resolve`](Self::resolve) for every response frame carrying a
/// request id; request issuers call [`register`](Self::register) before sending and then await
/// the returned waiter with [`wait`](Self::wait).
///
/// Bounded in two dimensions: at most `max_outstanding` unresolved waiters may exist at once
/// ([`SocketError::ResponseCapExceeded`] otherwise), and each wait is limited by the venue's
/// response check `timeout` ([`SocketError::ResponseTimeout`]).
#[derive(Debug, Clone)]
pub struct ResponseWaiters<Payload> {
    pending: Arc<Mutex<FnvHashMap<RequestId, oneshot::Sender<Payload>>>>,
    max_outstanding: usize,
    timeout: Duration,
}

impl<Payload> ResponseWaiters<Payload> {
    /// Construct a new [`ResponseWaiters`] with the provided outstanding cap and wait timeout.
    pub fn new(max_outstanding: usize, timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(FnvHashMap::default())),
            max_outstanding,
            timeout,
        }
    }

    /// Register a fresh [`RequestId`], returning it with the receiver the issuer awaits.
    pub fn register(&self) -> Result<(RequestId, oneshot::Receiver<Payload>), SocketError> {
        let mut pending = self.pending.lock();
        if pending.len() >= self.max_outstanding {
            return Err(SocketError::ResponseCapExceeded {
                max: self.max_outstanding,
            });
        }

        let id = RequestId::random();
        let (tx, rx) = oneshot::channel();
        pending.insert(id.clone(), tx);
        Ok((id, rx))
    }

    /// Resolve the waiter registered for the provided [`RequestId`] with the response payload.
    ///
    /// Returns `false` if no waiter was registered (eg/ it already timed out).
    pub fn resolve(&self, id: &RequestId, payload: Payload) -> bool {
        let waiter = {
            let mut pending = self.pending.lock();
            pending.remove(id)
        };
        match waiter {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Await the response for a registered waiter, bounded by the response check timeout.
    pub async fn wait(
        &self,
        id: RequestId,
        rx: oneshot::Receiver<Payload>,
    ) -> Result<Payload, SocketError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_recv_error)) => Err(SocketError::Cancelled("response waiter dropped")),
            Err(_elapsed) => {
                let mut pending = self.pending.lock();
                pending.remove(&id);
                Err(SocketError::ResponseTimeout)
            }
        }
    }

    /// Drain every outstanding waiter, notifying them of shutdown by dropping their senders.
    ///
    /// Idempotent: draining an empty set is a no-op.
    pub fn drain(&self) {
        let mut pending = self.pending.lock();
        pending.clear();
    }

    /// Number of unresolved waiters.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_resolve_wait() {
        let waiters = ResponseWaiters::<&'static str>::new(4, Duration::from_secs(1));

        let (id, rx) = waiters.register().unwrap();
        assert_eq!(waiters.outstanding(), 1);

        assert!(waiters.resolve(&id, "pong"));
        assert_eq!(waiters.wait(id, rx).await.unwrap(), "pong");
        assert_eq!(waiters.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_outstanding_cap() {
        let waiters = ResponseWaiters::<()>::new(1, Duration::from_secs(1));

        let _first = waiters.register().unwrap();
        assert!(matches!(
            waiters.register(),
            Err(SocketError::ResponseCapExceeded { max: 1 })
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out_and_releases_slot() {
        let waiters = ResponseWaiters::<()>::new(1, Duration::from_millis(5));

        let (id, rx) = waiters.register().unwrap();
        assert!(matches!(
            waiters.wait(id, rx).await,
            Err(SocketError::ResponseTimeout)
        ));
        assert_eq!(waiters.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_drain_cancels_waiters() {
        let waiters = ResponseWaiters::<()>::new(4, Duration::from_secs(1));

        let (id, rx) = waiters.register().unwrap();
        waiters.drain();
        assert!(matches!(
            waiters.wait(id, rx).await,
            Err(SocketError::Cancelled(_))
        ));
        // drain is idempotent
        waiters.drain();
    }
}
